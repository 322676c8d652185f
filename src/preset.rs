//! Named VASP parameter sets. `BulkSet` and `SlabSet` are compiled in, and
//! any other name is looked up as `<vasp_preset_dir>/<name>.json` or as a
//! literal path to a JSON file.

use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::{dicts::Params, settings::Settings};

const BUILTINS: [(&str, &str); 2] = [
    ("BulkSet", include_str!("../presets/vasp/BulkSet.json")),
    ("SlabSet", include_str!("../presets/vasp/SlabSet.json")),
];

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset `{0}` not found")]
    NotFound(String),

    #[error("failed to read preset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("preset `{name}` is not a JSON object: {reason}")]
    Parse { name: String, reason: String },
}

fn parse(name: &str, s: &str) -> Result<Params, PresetError> {
    let err = |reason: String| PresetError::Parse {
        name: name.to_owned(),
        reason,
    };
    match serde_json::from_str(s) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(err("top-level value is not an object".to_owned())),
        Err(e) => Err(err(e.to_string())),
    }
}

fn read(name: &str, path: &Path) -> Result<Params, PresetError> {
    debug!("loading preset {name} from {}", path.display());
    let s = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse(name, &s)
}

/// resolve the preset `name`
pub fn load(name: &str, settings: &Settings) -> Result<Params, PresetError> {
    if let Some((_, s)) = BUILTINS.iter().find(|(n, _)| *n == name) {
        return parse(name, s);
    }
    if let Some(dir) = &settings.vasp_preset_dir {
        let path = dir.join(format!("{name}.json"));
        if path.is_file() {
            return read(name, &path);
        }
    }
    let path = Path::new(name);
    if path.is_file() {
        return read(name, path);
    }
    Err(PresetError::NotFound(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builtins() {
        let s = Settings::default();
        let bulk = load("BulkSet", &s).unwrap();
        assert_eq!(bulk["encut"], json!(520));
        assert_eq!(bulk["kspacing"], json!(0.22));
        let slab = load("SlabSet", &s).unwrap();
        assert_eq!(slab["encut"], json!(450));
        assert_eq!(slab["lreal"], json!("Auto"));
    }

    #[test]
    fn preset_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Mine.json"), r#"{"encut": 600}"#)
            .unwrap();
        std::fs::write(dir.path().join("Bad.json"), "[1, 2]").unwrap();
        let s = Settings {
            vasp_preset_dir: Some(dir.path().to_owned()),
            ..Settings::default()
        };
        assert_eq!(load("Mine", &s).unwrap()["encut"], json!(600));
        assert!(matches!(load("Bad", &s), Err(PresetError::Parse { .. })));

        // literal paths work without a preset directory
        let path = dir.path().join("Mine.json");
        let got = load(path.to_str().unwrap(), &Settings::default()).unwrap();
        assert_eq!(got["encut"], json!(600));
    }

    #[test]
    fn not_found() {
        let got = load("NoSuchSet", &Settings::default());
        assert!(matches!(got, Err(PresetError::NotFound(n)) if n == "NoSuchSet"));
    }
}
