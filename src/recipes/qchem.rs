use std::path::PathBuf;

use serde_json::Value;

use crate::{
    dicts::{check_exclusive, merge_layers, MergeError, Params},
    geom::Atoms,
    params,
    program::{qchem::QChem, Program},
    runner::{run_calc, Context},
    schema::Summary,
};

use super::{cpu_count, RecipeError};

/// The knobs shared by the Q-Chem recipes. At most one of `pcm_dielectric`
/// and `smd_solvent` may be set
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub charge: i64,
    pub mult: i64,
    pub method: String,
    pub basis: String,
    pub scf_algorithm: String,

    /// dielectric constant for a PCM implicit solvent
    pub pcm_dielectric: Option<f64>,

    /// solvent name for the SMD implicit solvent model
    pub smd_solvent: Option<String>,

    /// defaults to every available thread
    pub n_cores: Option<usize>,
    pub copy_files: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            charge: 0,
            mult: 1,
            method: "wb97mv".to_owned(),
            basis: "def2-tzvpd".to_owned(),
            scf_algorithm: "diis".to_owned(),
            pcm_dielectric: None,
            smd_solvent: None,
            n_cores: None,
            copy_files: Vec::new(),
        }
    }
}

impl Options {
    /// the solvation options that are set, as a mapping
    fn solvation(&self) -> Params {
        let mut ret = Params::new();
        if let Some(d) = self.pcm_dielectric {
            ret.insert("pcm_dielectric".into(), d.into());
        }
        if let Some(s) = &self.smd_solvent {
            ret.insert("smd_solvent".into(), s.clone().into());
        }
        ret
    }
}

/// a single-point calculation
pub fn static_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    base_job(ctx, atoms, opts, "sp", overrides, "Q-Chem Static")
}

/// a geometry optimization
pub fn relax_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    base_job(ctx, atoms, opts, "opt", overrides, "Q-Chem Relax")
}

/// a frequency calculation
pub fn freq_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    base_job(ctx, atoms, opts, "freq", overrides, "Q-Chem Frequency")
}

/// `overrides` maps section names like `rem` or `pcm` to the keys to swap in
/// that section. a `null` key removes it from the section and a `null`
/// section drops the whole section
fn base_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    job_type: &str,
    overrides: Option<&Params>,
    name: &str,
) -> Result<Summary, RecipeError> {
    let solvation = opts.solvation();
    check_exclusive(&solvation, &["pcm_dielectric", "smd_solvent"])?;

    let mut rem = params! {
        "job_type": job_type,
        "method": opts.method,
        "basis": opts.basis,
        "scf_algorithm": opts.scf_algorithm,
        "max_scf_cycles": 200,
        "gen_scfman": true,
        "xc_grid": 3,
        "thresh": 14,
        "s2thresh": 16,
        "resp_charges": true,
        "symmetry": false,
        "sym_ignore": true,
    };
    if job_type == "opt" {
        rem.insert("geom_opt_max_cycles".into(), 200.into());
    }
    let mut sections = Params::new();
    if let Some(dielectric) = opts.pcm_dielectric {
        rem.insert("solvent_method".into(), "pcm".into());
        sections.insert(
            "pcm".into(),
            Value::Object(params! {
                "heavypoints": 194,
                "hpoints": 194,
                "radii": "uff",
                "theory": "cpcm",
                "vdwscale": 1.1,
            }),
        );
        sections.insert(
            "solvent".into(),
            Value::Object(params! {"dielectric": dielectric}),
        );
    } else if let Some(solvent) = &opts.smd_solvent {
        rem.insert("solvent_method".into(), "smd".into());
        sections.insert(
            "smx".into(),
            Value::Object(params! {"solvent": solvent}),
        );
    }
    let mut all = Params::new();
    all.insert("rem".into(), Value::Object(rem));
    all.extend(sections);
    let all = merge_sections(all, overrides)?;

    let n_cores = opts.n_cores.unwrap_or_else(cpu_count);
    let calc = QChem::new(opts.charge, opts.mult, n_cores, all);
    let run = run_calc(ctx, &calc, atoms, &opts.copy_files)?;
    Ok(Summary::new(name, calc.parameters(), run)
        .with_charge_mult(opts.charge, opts.mult))
}

fn merge_sections(
    mut sections: Params,
    overrides: Option<&Params>,
) -> Result<Params, MergeError> {
    for (name, swaps) in overrides.into_iter().flatten() {
        if swaps.is_null() {
            sections.shift_remove(name);
            continue;
        }
        let merged = merge_layers([sections.get(name), Some(swaps)], true)?;
        sections.insert(name.clone(), Value::Object(merged));
    }
    Ok(sections)
}
