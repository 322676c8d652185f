//! Slab recipes and the flows that generate slabs or adsorbate configurations
//! and relax them in parallel.

use std::path::PathBuf;

use log::info;
use rayon::prelude::*;

use crate::{
    dicts::Params,
    geom::Atoms,
    params,
    recipes::RecipeError,
    runner::Context,
    schema::Summary,
};

use super::base_job;

pub const SLAB_PRESET: &str = "SlabSet";

/// Cuts slabs from a bulk structure
pub trait SlabGenerator {
    fn make_slabs(&self, bulk: &Atoms) -> Vec<Atoms>;
}

/// Places an adsorbate on the sites of a slab, one structure per placement
pub trait AdsorbatePlacer {
    fn make_adsorbate_structures(
        &self,
        slab: &Atoms,
        adsorbate: &Atoms,
    ) -> Vec<Atoms>;
}

/// a single-point calculation on a slab, with a dipole correction along the
/// surface normal
pub fn slab_static_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    copy_files: &[PathBuf],
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let defaults = params! {
        "auto_dipole": true,
        "ismear": -5,
        "laechg": true,
        "lcharg": true,
        "lreal": false,
        "lvhar": true,
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
        "VASP Slab Static",
        copy_files,
    )
}

/// a relaxation of the positions in a slab
pub fn slab_relax_job(
    ctx: &Context,
    atoms: &Atoms,
    preset: Option<&str>,
    copy_files: &[PathBuf],
    overrides: Option<&Params>,
) -> Result<Summary, RecipeError> {
    let defaults = params! {
        "auto_dipole": true,
        "ediffg": -0.02,
        "isif": 2,
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
        "VASP Slab Relax",
        copy_files,
    )
}

/// relax every structure in `structures` in parallel, following each
/// relaxation with a static calculation when `run_static` is set. each job
/// gets its own results directory, and the results are in the order of
/// `structures`
fn relax_all(
    ctx: &Context,
    structures: &[Atoms],
    run_static: bool,
    relax_overrides: Option<&Params>,
    static_overrides: Option<&Params>,
) -> Result<Vec<Summary>, RecipeError> {
    info!("relaxing {} slabs", structures.len());
    let ctx = &ctx.with_unique_workdirs();
    structures
        .par_iter()
        .map(|slab| {
            let relaxed = slab_relax_job(
                ctx,
                slab,
                Some(SLAB_PRESET),
                &[],
                relax_overrides,
            )?;
            if !run_static {
                return Ok(relaxed);
            }
            slab_static_job(
                ctx,
                &relaxed.atoms,
                Some(SLAB_PRESET),
                &[],
                static_overrides,
            )
        })
        .collect()
}

/// cut slabs from `atoms` with `generator`, then relax each one and
/// optionally run a static calculation on the relaxed slab
pub fn bulk_to_slabs_flow(
    ctx: &Context,
    atoms: &Atoms,
    generator: &dyn SlabGenerator,
    run_static: bool,
    relax_overrides: Option<&Params>,
    static_overrides: Option<&Params>,
) -> Result<Vec<Summary>, RecipeError> {
    let slabs = generator.make_slabs(atoms);
    relax_all(ctx, &slabs, run_static, relax_overrides, static_overrides)
}

/// place `adsorbate` on `slab` with `placer`, then relax each configuration
/// and optionally run a static calculation on the relaxed structure
pub fn slab_to_ads_flow(
    ctx: &Context,
    slab: &Atoms,
    adsorbate: &Atoms,
    placer: &dyn AdsorbatePlacer,
    run_static: bool,
    relax_overrides: Option<&Params>,
    static_overrides: Option<&Params>,
) -> Result<Vec<Summary>, RecipeError> {
    let structures = placer.make_adsorbate_structures(slab, adsorbate);
    relax_all(ctx, &structures, run_static, relax_overrides, static_overrides)
}
