use std::path::PathBuf;

use serde_json::Value;

use crate::{
    dicts::{merge, Params},
    geom::Atoms,
    params,
    program::{gaussian::Gaussian, Program},
    runner::{run_calc, Context},
    schema::Summary,
};

use super::{cpu_count, RecipeError};

/// The molecule-level knobs shared by the Gaussian recipes
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub charge: i64,
    pub mult: i64,
    pub xc: String,
    pub basis: String,

    /// files to copy into the working directory before the run
    pub copy_files: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            charge: 0,
            mult: 1,
            xc: "wb97x-d".to_owned(),
            basis: "def2-tzvp".to_owned(),
            copy_files: Vec::new(),
        }
    }
}

/// a single-point calculation
pub fn static_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let defaults = params! {
        "mem": "16GB",
        "chk": "Gaussian.chk",
        "nprocshared": cpu_count(),
        "xc": opts.xc,
        "basis": opts.basis,
        "charge": opts.charge,
        "mult": opts.mult,
        "sp": "",
        "scf": ["maxcycle=250", "xqc"],
        "integral": "ultrafine",
        "nosymmetry": "",
        "pop": "CM5",
        "gfinput": "",
        "ioplist": ["6/7=3", "2/9=2000"],
    };
    base_job(ctx, atoms, &defaults, overrides, "Gaussian Static", opts)
}

/// a geometry optimization, followed by a frequency calculation when `freq`
/// is set
pub fn relax_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    freq: bool,
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let freq = if freq { Value::from("") } else { Value::Null };
    let defaults = params! {
        "mem": "16GB",
        "chk": "Gaussian.chk",
        "nprocshared": cpu_count(),
        "xc": opts.xc,
        "basis": opts.basis,
        "charge": opts.charge,
        "mult": opts.mult,
        "opt": "",
        "pop": "CM5",
        "scf": ["maxcycle=250", "xqc"],
        "integral": "ultrafine",
        "nosymmetry": "",
        "freq": freq,
        "ioplist": ["2/9=2000"],
    };
    base_job(ctx, atoms, &defaults, overrides, "Gaussian Relax", opts)
}

fn base_job(
    ctx: &Context,
    atoms: &Atoms,
    defaults: &Params,
    overrides: Option<&Params>,
    name: &str,
    opts: &Options,
) -> Result<Summary, RecipeError> {
    let calc = Gaussian::new(merge(defaults, overrides));
    let run = run_calc(ctx, &calc, atoms, &opts.copy_files)?;
    Ok(Summary::new(name, calc.parameters(), run)
        .with_charge_mult(opts.charge, opts.mult))
}
