use std::path::PathBuf;

use serde_json::Value;

use crate::{
    dicts::{merge, Params},
    geom::Atoms,
    program::{orca::Orca, Program},
    runner::{run_calc, Context},
    schema::Summary,
};

use super::{cpu_count, on_path, RecipeError};

/// The molecule-level knobs shared by the ORCA recipes
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
            xc: "wb97x-d3bj".to_owned(),
            basis: "def2-tzvp".to_owned(),
            copy_files: Vec::new(),
        }
    }
}

/// parallel runs are requested only when MPI is available
fn default_blocks() -> Params {
    let mut ret = Params::new();
    if on_path("mpirun", std::env::var_os("PATH").as_deref()) {
        ret.insert(format!("%pal nprocs {} end", cpu_count()), true.into());
    }
    ret
}

fn simple_input(opts: &Options, job: &[(&str, Value)]) -> Params {
    let mut ret = Params::new();
    ret.insert(opts.xc.clone(), true.into());
    ret.insert(opts.basis.clone(), true.into());
    for (k, v) in job {
        ret.insert(k.to_string(), v.clone());
    }
    ret
}

/// a single-point calculation. `input_swaps` and `block_swaps` are merged onto
/// the simple-input keywords and the `%` blocks: set a keyword to `true` to
/// add it and to `null` to drop a default
pub fn static_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    input_swaps: Option<&Params>,
    block_swaps: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let inputs = simple_input(
        opts,
        &[
            ("sp", true.into()),
            ("slowconv", true.into()),
            ("normalprint", true.into()),
            ("xyzfile", true.into()),
        ],
    );
    let calc = Orca::new(
        opts.charge,
        opts.mult,
        &merge(&inputs, input_swaps),
        &merge(&default_blocks(), block_swaps),
    );
    let run = run_calc(ctx, &calc, atoms, &opts.copy_files)?;
    Ok(Summary::new("ORCA Static", calc.parameters(), run)
        .with_charge_mult(opts.charge, opts.mult))
}

/// a geometry optimization, with frequencies when `run_freq` is set
pub fn relax_job(
    ctx: &Context,
    atoms: &Atoms,
    opts: &Options,
    run_freq: bool,
    input_swaps: Option<&Params>,
    block_swaps: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let freq = if run_freq { Value::Bool(true) } else { Value::Null };
    let inputs = simple_input(
        opts,
        &[
            ("opt", true.into()),
            ("slowconv", true.into()),
            ("normalprint", true.into()),
            ("freq", freq),
            ("xyzfile", true.into()),
        ],
    );
    let calc = Orca::new(
        opts.charge,
        opts.mult,
        &merge(&inputs, input_swaps),
        &merge(&default_blocks(), block_swaps),
    );
    let run = run_calc(ctx, &calc, atoms, &opts.copy_files)?;
    Ok(Summary::new("ORCA Relax", calc.parameters(), run)
        .with_charge_mult(opts.charge, opts.mult))
}
