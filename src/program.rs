use std::{fs::File, io::Write, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{dicts::Params, geom::Atoms, settings::Settings};

pub mod gaussian;
pub mod orca;
pub mod qchem;
pub mod vasp;

/// eV per hartree
pub const HARTREE: f64 = 27.211386245988;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("output file {0} not found")]
    FileNotFound(String),

    #[error("error found in {0}")]
    ErrorInOutput(String),

    #[error("no energy found in {0}")]
    EnergyNotFound(String),

    #[error("failed to parse energy in {0}")]
    EnergyParseError(String),

    #[error("failed to parse geometry in {0}")]
    GeomParseError(String),

    #[error("calculation in {0} did not converge")]
    Unconverged(String),

    #[error("a periodic cell is required")]
    MissingCell,

    #[error("parameter `{0}` cannot be written to the input file")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProgramError {
    /// Returns `true` if the program error is [`ErrorInOutput`].
    ///
    /// [`ErrorInOutput`]: ProgramError::ErrorInOutput
    #[must_use]
    pub fn is_error_in_output(&self) -> bool {
        matches!(self, Self::ErrorInOutput(..))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramResult {
    /// final energy in eV
    pub energy: f64,

    /// the structure at the end of the run, if the program reports one
    pub final_atoms: Option<Atoms>,
}

/// A calculator wrapping one external engine. An instance holds the fully
/// merged parameters for a single run
pub trait Program {
    /// human-readable name of the engine
    fn name(&self) -> &'static str;

    /// the merged parameters the calculator was built from
    fn parameters(&self) -> &Params;

    /// the input file names and their contents for a run on `atoms`
    fn build_input(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<(String, String)>, ProgramError>;

    /// the shell command that runs the engine inside the working directory
    fn command(&self, settings: &Settings) -> String;

    /// parse the output files in `dir`. `atoms` is the structure the run
    /// started from, which supplies labels and the cell for geometries the
    /// engine reports
    fn read_output(
        &self,
        dir: &Path,
        atoms: &Atoms,
        settings: &Settings,
    ) -> Result<ProgramResult, ProgramError>;

    /// write the input files for `atoms` into `dir`
    fn write_input(&self, dir: &Path, atoms: &Atoms) -> Result<(), ProgramError> {
        for (name, contents) in self.build_input(atoms)? {
            let mut file = File::create(dir.join(name))?;
            write!(file, "{contents}")?;
        }
        Ok(())
    }
}

fn take_i64(params: &mut Params, key: &str, default: i64) -> i64 {
    params
        .shift_remove(key)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
}

fn take_map(params: &mut Params, key: &str) -> Params {
    match params.shift_remove(key) {
        Some(Value::Object(map)) => map,
        _ => Params::new(),
    }
}

/// build the calculator for `engine` directly from `params`, without any
/// recipe defaults. ORCA takes its keywords from the `simple_input` and
/// `blocks` mappings, ORCA and Q-Chem read `charge` and `mult` (default 0 and
/// 1), and VASP is built without a preset
pub fn from_name(
    engine: &str,
    atoms: &Atoms,
    mut params: Params,
) -> Option<Box<dyn Program>> {
    let ret: Box<dyn Program> = match engine.to_lowercase().as_str() {
        "gaussian" => Box::new(gaussian::Gaussian::new(params)),
        "orca" => {
            let charge = take_i64(&mut params, "charge", 0);
            let mult = take_i64(&mut params, "mult", 1);
            let simple = take_map(&mut params, "simple_input");
            let blocks = take_map(&mut params, "blocks");
            Box::new(orca::Orca::new(charge, mult, &simple, &blocks))
        }
        "vasp" => Box::new(vasp::Vasp::new(atoms, None, &params)),
        "qchem" | "q-chem" => {
            let charge = take_i64(&mut params, "charge", 0);
            let mult = take_i64(&mut params, "mult", 1);
            Box::new(qchem::QChem::new(charge, mult, 1, params))
        }
        _ => return None,
    };
    Some(ret)
}

/// render a scalar or list parameter as plain text, joining list entries with
/// `sep`. returns None for objects
pub(crate) fn value_string(v: &Value, sep: &str) -> Option<String> {
    match v {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(vs) => {
            let parts: Option<Vec<_>> =
                vs.iter().map(|v| value_string(v, sep)).collect();
            Some(parts?.join(sep))
        }
        Value::Object(_) => None,
    }
}

/// return the contents of `dir/name` or [ProgramError::FileNotFound]
pub(crate) fn read_file(
    dir: &Path,
    name: &str,
) -> Result<(String, String), ProgramError> {
    let path = dir.join(name);
    let outname = path.to_string_lossy().to_string();
    match std::fs::read_to_string(&path) {
        Ok(s) => Ok((s, outname)),
        Err(_) => Err(ProgramError::FileNotFound(outname)),
    }
}

/// parse the whitespace-separated field `n` of `line` as an energy
pub(crate) fn energy_field(
    line: &str,
    n: usize,
    outname: &str,
) -> Result<f64, ProgramError> {
    line.split_whitespace()
        .nth(n)
        .and_then(|e| e.parse::<f64>().ok())
        .ok_or_else(|| ProgramError::EnergyParseError(outname.to_owned()))
}

/// replace the coordinates of `atoms` with `coords`, which must have one
/// entry per atom
pub(crate) fn with_coords(
    atoms: &Atoms,
    coords: Vec<[f64; 3]>,
    outname: &str,
) -> Result<Atoms, ProgramError> {
    if coords.len() != atoms.len() {
        return Err(ProgramError::GeomParseError(outname.to_owned()));
    }
    let mut ret = atoms.clone();
    for (atom, c) in ret.atoms.iter_mut().zip(coords) {
        atom.coord = c;
    }
    Ok(ret)
}

/// parse three Cartesian coordinates from the fields of a table row,
/// starting at `start`
pub(crate) fn coord_fields(line: &str, start: usize) -> Option<[f64; 3]> {
    let mut fields = line.split_whitespace().skip(start);
    let mut ret = [0.0; 3];
    for c in &mut ret {
        *c = fields.next()?.parse().ok()?;
    }
    Some(ret)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::geom::Atom;

    #[test]
    fn values() {
        assert_eq!(value_string(&json!("CM5"), ","), Some("CM5".to_owned()));
        assert_eq!(value_string(&json!(-0.02), ","), Some("-0.02".to_owned()));
        assert_eq!(
            value_string(&json!(["maxcycle=250", "xqc"]), ","),
            Some("maxcycle=250,xqc".to_owned())
        );
        assert_eq!(value_string(&json!([1, 2, 3]), " "), Some("1 2 3".into()));
        assert_eq!(value_string(&json!({"a": 1}), ","), None);
    }

    #[test]
    fn coords() {
        let atoms = Atoms::new(vec![
            Atom::new("O", 0.0, 0.0, 0.0),
            Atom::new("H", 0.0, 0.0, 1.0),
        ]);
        let got =
            with_coords(&atoms, vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], "x")
                .unwrap();
        assert_eq!(got.atoms[1], Atom::new("H", 2.0, 0.0, 0.0));
        assert!(matches!(
            with_coords(&atoms, vec![[1.0, 0.0, 0.0]], "x"),
            Err(ProgramError::GeomParseError(_))
        ));
        assert_eq!(
            coord_fields("    1   8   0   0.1  -0.2  0.3", 3),
            Some([0.1, -0.2, 0.3])
        );
        assert_eq!(coord_fields("1 8 0 x", 3), None);
    }

    #[test]
    fn by_name() {
        let atoms = Atoms::default();
        let p = from_name("Gaussian", &atoms, Params::new()).unwrap();
        assert_eq!(p.name(), "Gaussian");

        let params = crate::params! {
            "charge": -1,
            "simple_input": {"hf": true, "sto-3g": true},
        };
        let p = from_name("orca", &atoms, params).unwrap();
        assert_eq!(p.parameters()["orcasimpleinput"], json!("hf sto-3g"));
        assert_eq!(p.parameters()["charge"], json!(-1));
        assert_eq!(p.parameters()["mult"], json!(1));

        let params = crate::params! {"mult": 3, "rem": {"method": "hf"}};
        let p = from_name("qchem", &atoms, params).unwrap();
        assert_eq!(p.parameters()["spin_multiplicity"], json!(3));
        assert!(p.parameters().contains_key("rem"));

        assert!(from_name("vasp", &atoms, Params::new()).is_some());
        assert!(from_name("molpro", &atoms, Params::new()).is_none());
    }
}
