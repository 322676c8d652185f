use std::{path::Path, sync::OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::{dicts::Params, geom::Atoms, settings::Settings};

use super::{
    coord_fields, energy_field, read_file, value_string, with_coords, Program,
    ProgramError, ProgramResult, HARTREE,
};

#[cfg(test)]
mod tests;

pub const LABEL: &str = "Gaussian";
pub const INPUT_FILE: &str = "Gaussian.com";
pub const LOG_FILE: &str = "Gaussian.log";

/// keys written as `%key=value` lines before the route section
const LINK0: [&str; 13] = [
    "mem",
    "chk",
    "oldchk",
    "nprocshared",
    "nproc",
    "rwf",
    "int",
    "d2e",
    "lindaworkers",
    "kjob",
    "save",
    "nosave",
    "cpu",
];

/// keys consumed somewhere other than the route keywords
const SPECIAL: [&str; 6] = ["xc", "method", "basis", "charge", "mult", "ioplist"];

static CELL: OnceLock<[Regex; 5]> = OnceLock::new();

/// A Gaussian calculator. Parameters follow the usual calculator keys: link-0
/// commands like `mem` and `chk`, `xc` (or `method`, never both) and `basis`
/// for the model chemistry, `charge` and `mult` for the charge line,
/// `ioplist` for IOp overrides, and everything else as a route keyword
#[derive(Debug, Clone)]
pub struct Gaussian {
    params: Params,
}

impl Gaussian {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.params.get(key).and_then(|v| value_string(v, ","))
    }

    /// the route line starting with `#P`
    fn route(&self) -> Result<String, ProgramError> {
        let mut route = vec![String::from("#P")];
        let method = match (self.get("xc"), self.get("method")) {
            (Some(_), Some(_)) => {
                return Err(ProgramError::InvalidParameter("method".to_owned()))
            }
            (xc, method) => xc.or(method),
        };
        match (method, self.get("basis")) {
            (Some(m), Some(b)) => route.push(format!("{m}/{b}")),
            (Some(m), None) => route.push(m),
            (None, Some(b)) => route.push(b),
            (None, None) => {}
        }
        for (key, val) in &self.params {
            if LINK0.contains(&key.as_str()) || SPECIAL.contains(&key.as_str())
            {
                continue;
            }
            let kw = match val {
                Value::Bool(false) | Value::Null => continue,
                Value::Bool(true) => key.clone(),
                Value::String(s) if s.is_empty() => key.clone(),
                Value::Array(_) => {
                    let v = value_string(val, ",").ok_or_else(|| {
                        ProgramError::InvalidParameter(key.clone())
                    })?;
                    format!("{key}({v})")
                }
                _ => {
                    let v = value_string(val, ",").ok_or_else(|| {
                        ProgramError::InvalidParameter(key.clone())
                    })?;
                    if v.contains(',') {
                        format!("{key}({v})")
                    } else {
                        format!("{key}={v}")
                    }
                }
            };
            route.push(kw);
        }
        if let Some(iops) = self.get("ioplist") {
            route.push(format!("iop({iops})"));
        }
        Ok(route.join(" "))
    }
}

impl Program for Gaussian {
    fn name(&self) -> &'static str {
        LABEL
    }

    fn parameters(&self) -> &Params {
        &self.params
    }

    /// Example input file:
    /// ```text
    /// %mem=16GB
    /// %chk=Gaussian.chk
    /// #P wb97x-d/def2-tzvp sp scf(maxcycle=250,xqc) integral=ultrafine
    ///
    /// Gaussian input prepared by cookbook
    ///
    /// 0 1
    /// H 0.000000000000 0.000000000000 0.000000000000
    /// H 0.000000000000 0.000000000000 0.740000000000
    ///
    /// ```
    fn build_input(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<(String, String)>, ProgramError> {
        use std::fmt::Write;
        let mut body = String::new();
        for key in LINK0 {
            if let Some(v) = self.params.get(key) {
                let v = value_string(v, ",")
                    .ok_or_else(|| ProgramError::InvalidParameter(key.into()))?;
                writeln!(body, "%{key}={v}").unwrap();
            }
        }
        writeln!(body, "{}", self.route()?).unwrap();
        writeln!(body, "\nGaussian input prepared by cookbook\n").unwrap();
        let charge = self.get("charge").unwrap_or_else(|| "0".to_owned());
        let mult = self.get("mult").unwrap_or_else(|| "1".to_owned());
        writeln!(body, "{charge} {mult}").unwrap();
        for atom in &atoms.atoms {
            let [x, y, z] = atom.coord;
            writeln!(body, "{} {x:.12} {y:.12} {z:.12}", atom.label).unwrap();
        }
        body.push('\n');
        Ok(vec![(INPUT_FILE.to_owned(), body)])
    }

    fn command(&self, settings: &Settings) -> String {
        format!("{} < {INPUT_FILE} > {LOG_FILE}", settings.gaussian_cmd)
    }

    /// reads the last SCF energy and the last printed orientation from the log
    /// file. the job must have terminated normally
    fn read_output(
        &self,
        dir: &Path,
        atoms: &Atoms,
        _settings: &Settings,
    ) -> Result<ProgramResult, ProgramError> {
        let (contents, outname) = read_file(dir, LOG_FILE)?;
        let [error_re, normal_re, energy_re, orient_re, dash_re] =
            CELL.get_or_init(|| {
                [
                    Regex::new(r"Error termination").unwrap(),
                    Regex::new(r"Normal termination of Gaussian").unwrap(),
                    Regex::new(r"^\s*SCF Done:").unwrap(),
                    Regex::new(r"(Standard|Input) orientation:").unwrap(),
                    Regex::new(r"^\s*-{10,}\s*$").unwrap(),
                ]
            });

        if error_re.is_match(&contents) || !normal_re.is_match(&contents) {
            return Err(ProgramError::ErrorInOutput(outname));
        }

        let mut energy = None;
        let mut coords = Vec::new();
        let mut last_coords = None;
        // header lines left to skip before the table rows
        let mut skip = 0;
        let mut in_table = false;
        for line in contents.lines() {
            if skip > 0 {
                skip -= 1;
            } else if energy_re.is_match(line) {
                // SCF Done:  E(RwB97XD) =  -76.3862711234     A.U. after ...
                energy = Some(energy_field(line, 4, &outname)? * HARTREE);
            } else if orient_re.is_match(line) {
                skip = 4;
                in_table = true;
                coords.clear();
            } else if in_table && dash_re.is_match(line) {
                in_table = false;
                last_coords = Some(std::mem::take(&mut coords));
            } else if in_table {
                let c = coord_fields(line, 3).ok_or_else(|| {
                    ProgramError::GeomParseError(outname.clone())
                })?;
                coords.push(c);
            }
        }

        let Some(energy) = energy else {
            return Err(ProgramError::EnergyNotFound(outname));
        };
        let final_atoms = match last_coords {
            Some(c) => Some(with_coords(atoms, c, &outname)?),
            None => None,
        };
        Ok(ProgramResult {
            energy,
            final_atoms,
        })
    }
}
