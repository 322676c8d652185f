//! Recipes for running Gaussian, ORCA, VASP and Q-Chem calculations.
//!
//! Every recipe builds its calculator parameters by layering user overrides
//! on top of recipe defaults with [dicts::merge_layers], writes the engine's
//! input files into a scratch directory, runs the engine and parses the
//! output into a [schema::Summary].

pub mod dicts;
pub mod geom;
pub mod preset;
pub mod program;
pub mod recipes;
pub mod runner;
pub mod schema;
pub mod settings;
