//! Ready-made jobs for each engine. A recipe merges its defaults with the
//! caller's overrides, runs the engine through [crate::runner::run_calc] and
//! returns a [crate::schema::Summary]. Setting an override to `null` removes
//! the corresponding default.

use thiserror::Error;

use crate::{dicts::MergeError, preset::PresetError, runner::RunError};

pub mod gaussian;
pub mod orca;
pub mod qchem;
pub mod vasp;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// the number of threads available to this process, falling back to 1
pub(crate) fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// whether an executable named `exe` is found on `path`, a `PATH`-style list
/// of directories
pub(crate) fn on_path(exe: &str, path: Option<&std::ffi::OsStr>) -> bool {
    let Some(path) = path else {
        return false;
    };
    std::env::split_paths(path).any(|dir| dir.join(exe).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_path() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("mpirun"), "").unwrap();
        let path = std::env::join_paths([a.path(), b.path()]).unwrap();
        assert!(on_path("mpirun", Some(path.as_os_str())));
        assert!(!on_path("srun", Some(path.as_os_str())));
        assert!(!on_path("mpirun", None));
        assert!(cpu_count() >= 1);
    }
}
