use std::path::PathBuf;

use crate::{
    dicts::{merge_with, Params},
    geom::Atoms,
    params,
    preset,
    program::{vasp::Vasp, Program},
    runner::{run_calc, Context},
    schema::Summary,
};

use super::RecipeError;

pub mod slabs;


pub const BULK_PRESET: &str = "BulkSet";

/// a single-point calculation
pub fn static_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    copy_files: &[PathBuf],
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let defaults = params! {
        "ismear": -5,
        "laechg": true,
        "lcharg": true,
        "lreal": false,
        "lwave": true,
        "nedos": 5001,
        "nsw": 0,
    };
    base_job(
        ctx,
        atoms,
        preset,
        &defaults,
        overrides,
        "VASP Static",
        copy_files,
    )
}

/// a relaxation of the positions, and of the cell too when `relax_cell` is set
pub fn relax_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    relax_cell: bool,
    copy_files: &[PathBuf],
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let isif = if relax_cell { 3 } else { 2 };
    let defaults = params! {
        "ediffg": -0.02,
        "isif": isif,
        "ibrion": 2,
        "isym": 0,
        "lcharg": false,
        "lwave": false,
        "nsw": 200,
        "symprec": 1e-8,
    };
    base_job(
        ctx,
        atoms,
        preset,
        &defaults,
        overrides,
        "VASP Relax",
        copy_files,
    )
}

/// two relaxations in a row, the second starting from the structure and
/// wavefunction of the first. useful for a cheap pre-relaxation, for volume
/// relaxations with large changes in volume, or for a GGA run before a
/// meta-GGA or hybrid one. the first summary is stored as `relax1`, and each
/// relaxation is gathered into its own results directory
pub fn double_relax_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    relax_cell: bool,
    relax1: Option<&Params>,
    relax2: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let ctx = &ctx.with_unique_workdirs();
    let summary1 = relax_job(ctx, atoms, preset, relax_cell, &[], relax1)?;
    let wavecar = summary1.dir.join("WAVECAR");
    let mut summary2 = relax_job(
        ctx,
        &summary1.atoms,
        preset,
        relax_cell,
        &[wavecar],
        relax2,
    )?;
    summary2.relax1 = Some(Box::new(summary1));
    Ok(summary2)
}

/// shared by every VASP recipe. nulls in `overrides` are kept here so that
/// they remove keys from the preset when the calculator is built
pub(crate) fn base_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    defaults: &Params,
    overrides: Option<&Params>,
    name: &str,
    copy_files: &[PathBuf],
) -> Result<Summary, RecipeError> {
    let flags = merge_with([Some(defaults), overrides], false);
    let preset = match preset {
        Some(p) => Some(preset::load(p, &ctx.settings)?),
        None => None,
    };
    let calc = Vasp::new(atoms, preset.as_ref(), &flags);
    let run = run_calc(ctx, &calc, atoms, copy_files)?;
    Ok(Summary::new(name, calc.parameters(), run))
}
