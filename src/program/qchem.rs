use std::{path::Path, sync::OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::{dicts::Params, geom::Atoms, settings::Settings};

use super::{
    coord_fields, energy_field, read_file, value_string, with_coords, Program,
    ProgramError, ProgramResult, HARTREE,
};

pub const INPUT_FILE: &str = "mol.qin";
pub const LOG_FILE: &str = "mol.qout";

static CELL: OnceLock<[Regex; 4]> = OnceLock::new();

/// A Q-Chem calculator. Every object-valued entry of the parameters is
/// written as a `$name` section after `$molecule`, so `{"rem": {...}, "pcm":
/// {...}}` produces `$rem` and `$pcm` blocks
#[derive(Debug, Clone)]
pub struct QChem {
    params: Params,
    charge: i64,
    mult: i64,
    n_cores: usize,
}

impl QChem {
    pub fn new(
        charge: i64,
        mult: i64,
        n_cores: usize,
        sections: Params,
    ) -> Self {
        let mut params = Params::new();
        params.insert("charge".into(), charge.into());
        params.insert("spin_multiplicity".into(), mult.into());
        params.extend(sections);
        Self {
            params,
            charge,
            mult,
            n_cores,
        }
    }

    fn section(
        name: &str,
        entries: &Params,
        sep: &str,
    ) -> Result<String, ProgramError> {
        use std::fmt::Write;
        let mut ret = format!("${name}\n");
        for (k, v) in entries {
            if v.is_null() {
                continue;
            }
            let v = value_string(v, " ")
                .ok_or_else(|| ProgramError::InvalidParameter(k.clone()))?;
            writeln!(ret, "   {k}{sep}{v}").unwrap();
        }
        ret.push_str("$end\n");
        Ok(ret)
    }
}

impl Program for QChem {
    fn name(&self) -> &'static str {
        "Q-Chem"
    }

    fn parameters(&self) -> &Params {
        &self.params
    }

    fn build_input(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<(String, String)>, ProgramError> {
        use std::fmt::Write;
        let mut body = String::from("$molecule\n");
        writeln!(body, "{} {}", self.charge, self.mult).unwrap();
        for atom in &atoms.atoms {
            let [x, y, z] = atom.coord;
            writeln!(body, "{} {x:.12} {y:.12} {z:.12}", atom.label).unwrap();
        }
        body.push_str("$end\n");
        for (name, val) in &self.params {
            let Value::Object(entries) = val else {
                continue;
            };
            let sep = if name == "rem" { " = " } else { " " };
            body.push('\n');
            body.push_str(&Self::section(name, entries, sep)?);
        }
        Ok(vec![(INPUT_FILE.to_owned(), body)])
    }

    fn command(&self, settings: &Settings) -> String {
        format!(
            "{} -nt {} {INPUT_FILE} {LOG_FILE}",
            settings.qchem_cmd, self.n_cores
        )
    }

    fn read_output(
        &self,
        dir: &Path,
        atoms: &Atoms,
        _settings: &Settings,
    ) -> Result<ProgramResult, ProgramError> {
        let (contents, outname) = read_file(dir, LOG_FILE)?;
        let [normal_re, energy_re, orient_re, dash_re] = CELL.get_or_init(|| {
            [
                Regex::new(r"Thank you very much for using Q-Chem").unwrap(),
                Regex::new(
                    r"Total energy in the final basis set =|Final energy is",
                )
                .unwrap(),
                Regex::new(r"Standard Nuclear Orientation").unwrap(),
                Regex::new(r"^\s*-{10,}\s*$").unwrap(),
            ]
        });
        if !normal_re.is_match(&contents) {
            return Err(ProgramError::ErrorInOutput(outname));
        }

        let mut energy = None;
        let mut coords = Vec::new();
        let mut last_coords = None;
        let mut skip = 0;
        let mut in_table = false;
        for line in contents.lines() {
            if skip > 0 {
                skip -= 1;
            } else if energy_re.is_match(line) {
                let e = line.split_whitespace().last().unwrap_or_default();
                energy = Some(energy_field(e, 0, &outname)? * HARTREE);
            } else if orient_re.is_match(line) {
                // column header and the dashes below it
                skip = 2;
                in_table = true;
                coords.clear();
            } else if in_table && dash_re.is_match(line) {
                in_table = false;
                last_coords = Some(std::mem::take(&mut coords));
            } else if in_table {
                let c = coord_fields(line, 2).ok_or_else(|| {
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
