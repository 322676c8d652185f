//! Process-wide settings such as executable names and working directories.
//!
//! A [Settings] value is built once, usually with [Settings::load], and then
//! passed to every job through a [crate::runner::Context]. Sources are layered
//! with the same merge used for calculator parameters, from lowest to highest
//! precedence:
//!
//! 1. the built-in defaults
//! 2. a JSON file named by `COOKBOOK_CONFIG_FILE`, or `~/.cookbook.json`
//! 3. `COOKBOOK_<FIELD>` environment variables, like `COOKBOOK_GAUSSIAN_CMD`
//!
//! Setting a field to `null` in the file resets it to its default.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dicts::{merge_layers, MergeError, Params};

pub const CONFIG_ENV: &str = "COOKBOOK_CONFIG_FILE";
const ENV_PREFIX: &str = "COOKBOOK_";
const DEFAULT_FILE: &str = ".cookbook.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings layer: {0}")]
    Merge(#[from] MergeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gaussian_cmd: String,
    pub orca_cmd: String,
    pub vasp_cmd: String,

    /// prefix for launching VASP in parallel, like `srun -N 1`
    pub vasp_parallel_cmd: String,
    pub qchem_cmd: String,

    /// base directory for the per-job scratch directories
    pub scratch_dir: PathBuf,

    /// where the files of finished jobs are moved
    pub results_dir: PathBuf,

    /// put each job's files in their own subdirectory of `results_dir`
    pub create_unique_workdir: bool,

    /// gzip files as they are moved to the results directory
    pub gzip_files: bool,

    /// treat unconverged relaxations as errors
    pub check_convergence: bool,

    /// extra directory searched for VASP presets by name
    pub vasp_preset_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gaussian_cmd: "g16".to_owned(),
            orca_cmd: "orca".to_owned(),
            vasp_cmd: "vasp_std".to_owned(),
            vasp_parallel_cmd: String::new(),
            qchem_cmd: "qchem".to_owned(),
            scratch_dir: std::env::temp_dir(),
            results_dir: PathBuf::from("."),
            create_unique_workdir: false,
            gzip_files: true,
            check_convergence: true,
            vasp_preset_dir: None,
        }
    }
}

impl Settings {
    /// load the settings from the config file and the environment
    pub fn load() -> Result<Self, SettingsError> {
        let file = match std::env::var(CONFIG_ENV) {
            Ok(f) => Some(PathBuf::from(f)),
            Err(_) => home()
                .map(|h| h.join(DEFAULT_FILE))
                .filter(|p| p.exists()),
        };
        let file = match file {
            Some(path) => {
                debug!("reading settings from {}", path.display());
                Some(read_file(&path)?)
            }
            None => None,
        };
        let env = env_layer(|k| std::env::var(k).ok());
        Self::from_layers(file.as_ref(), Some(&env))
    }

    /// build settings from the defaults overlaid by `file` and then `env`
    pub fn from_layers(
        file: Option<&Value>,
        env: Option<&Value>,
    ) -> Result<Self, SettingsError> {
        let defaults = serde_json::to_value(Self::default())?;
        let merged = merge_layers([Some(&defaults), file, env], true)?;
        let mut ret: Self = serde_json::from_value(Value::Object(merged))?;
        ret.scratch_dir = expand_home(&ret.scratch_dir);
        ret.results_dir = expand_home(&ret.results_dir);
        ret.vasp_preset_dir = ret.vasp_preset_dir.as_deref().map(expand_home);
        Ok(ret)
    }
}

fn read_file(path: &Path) -> Result<Value, SettingsError> {
    let s = read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(serde_json::from_str(&s)?)
}

/// collect `COOKBOOK_<FIELD>` variables from `lookup`. values for fields
/// holding strings or paths are taken verbatim, everything else is parsed as
/// JSON when possible
pub fn env_layer(lookup: impl Fn(&str) -> Option<String>) -> Value {
    let Ok(Value::Object(defaults)) = serde_json::to_value(Settings::default())
    else {
        unreachable!("Settings serializes to an object");
    };
    let mut ret = Params::new();
    for (key, default) in &defaults {
        let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
        let Some(raw) = lookup(&var) else {
            continue;
        };
        let value = match default {
            Value::String(_) | Value::Null => Value::String(raw),
            _ => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        };
        ret.insert(key.clone(), value);
    }
    Value::Object(ret)
}

fn home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_owned(),
    }
}
