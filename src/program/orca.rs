use std::{path::Path, sync::OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::{dicts::Params, geom::Atoms, settings::Settings};

use super::{
    energy_field, read_file, with_coords, Program, ProgramError,
    ProgramResult, HARTREE,
};

pub const INPUT_FILE: &str = "orca.inp";
pub const LOG_FILE: &str = "orca.out";
pub const GEOM_FILE: &str = "orca.xyz";

static CELL: OnceLock<[Regex; 2]> = OnceLock::new();

/// An ORCA calculator. The simple input line and the `%` blocks are each
/// built from a mapping whose enabled keys are joined in order, so a keyword
/// is switched off by removing it or setting it to `false`
#[derive(Debug, Clone)]
pub struct Orca {
    params: Params,
    simple_input: String,
    blocks: String,
    charge: i64,
    mult: i64,
}

/// join the keys of `layer` whose values are not `false`
fn enabled_keys(layer: &Params) -> String {
    layer
        .iter()
        .filter(|(_, v)| !matches!(v, Value::Bool(false)))
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Orca {
    pub fn new(
        charge: i64,
        mult: i64,
        simple_input: &Params,
        blocks: &Params,
    ) -> Self {
        let simple_input = enabled_keys(simple_input);
        let blocks = enabled_keys(blocks);
        let mut params = Params::new();
        params.insert("charge".into(), charge.into());
        params.insert("mult".into(), mult.into());
        params.insert("orcasimpleinput".into(), simple_input.clone().into());
        params.insert("orcablocks".into(), blocks.clone().into());
        Self {
            params,
            simple_input,
            blocks,
            charge,
            mult,
        }
    }
}

impl Program for Orca {
    fn name(&self) -> &'static str {
        "ORCA"
    }

    fn parameters(&self) -> &Params {
        &self.params
    }

    fn build_input(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<(String, String)>, ProgramError> {
        use std::fmt::Write;
        let mut body = format!("! {}\n", self.simple_input);
        if !self.blocks.is_empty() {
            writeln!(body, "{}", self.blocks).unwrap();
        }
        writeln!(body, "*xyz {} {}", self.charge, self.mult).unwrap();
        for atom in &atoms.atoms {
            let [x, y, z] = atom.coord;
            writeln!(body, "{} {x:.12} {y:.12} {z:.12}", atom.label).unwrap();
        }
        body.push_str("*\n");
        Ok(vec![(INPUT_FILE.to_owned(), body)])
    }

    fn command(&self, settings: &Settings) -> String {
        format!("{} {INPUT_FILE} > {LOG_FILE}", settings.orca_cmd)
    }

    fn read_output(
        &self,
        dir: &Path,
        atoms: &Atoms,
        _settings: &Settings,
    ) -> Result<ProgramResult, ProgramError> {
        let (contents, outname) = read_file(dir, LOG_FILE)?;
        let [normal_re, energy_re] = CELL.get_or_init(|| {
            [
                Regex::new(r"\*\*\*\*ORCA TERMINATED NORMALLY\*\*\*\*").unwrap(),
                Regex::new(r"^FINAL SINGLE POINT ENERGY").unwrap(),
            ]
        });
        if !normal_re.is_match(&contents) {
            return Err(ProgramError::ErrorInOutput(outname));
        }
        let mut energy = None;
        for line in contents.lines().filter(|l| energy_re.is_match(l)) {
            energy = Some(energy_field(line, 4, &outname)? * HARTREE);
        }
        let Some(energy) = energy else {
            return Err(ProgramError::EnergyNotFound(outname));
        };

        // the xyz file is only written with the xyzfile keyword
        let final_atoms = match read_file(dir, GEOM_FILE) {
            Ok((s, geomname)) => {
                let got: Atoms = s
                    .parse()
                    .map_err(|_| ProgramError::GeomParseError(geomname.clone()))?;
                let coords = got.atoms.into_iter().map(|a| a.coord).collect();
                Some(with_coords(atoms, coords, &geomname)?)
            }
            Err(_) => None,
        };
        Ok(ProgramResult {
            energy,
            final_atoms,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{geom::Atom, params};

    use super::*;

    fn h2() -> Atoms {
        Atoms::new(vec![
            Atom::new("H", 0.0, 0.0, 0.0),
            Atom::new("H", 0.0, 0.0, 0.74),
        ])
    }

    #[test]
    fn write_input() {
        let inputs = params! {
            "wb97x-d3bj": true,
            "def2-tzvp": true,
            "sp": true,
            "slowconv": false,
            "xyzfile": true,
        };
        let blocks = params! {"%pal nprocs 8 end": true};
        let orca = Orca::new(-1, 2, &inputs, &blocks);
        let got = &orca.build_input(&h2()).unwrap()[0].1;
        let want = "! wb97x-d3bj def2-tzvp sp xyzfile
%pal nprocs 8 end
*xyz -1 2
H 0.000000000000 0.000000000000 0.000000000000
H 0.000000000000 0.000000000000 0.740000000000
*
";
        assert_eq!(got, want);
        assert_eq!(
            orca.parameters()["orcasimpleinput"],
            "wb97x-d3bj def2-tzvp sp xyzfile"
        );
    }

    #[test]
    fn no_blocks() {
        let orca = Orca::new(0, 1, &params! {"hf": true}, &Params::new());
        let got = &orca.build_input(&h2()).unwrap()[0].1;
        assert!(got.starts_with("! hf\n*xyz 0 1\n"));
    }

    #[test]
    fn read_output() {
        let dir = tempfile::tempdir().unwrap();
        for f in [LOG_FILE, GEOM_FILE] {
            std::fs::copy(
                Path::new("testfiles/orca").join(f),
                dir.path().join(f),
            )
            .unwrap();
        }
        let orca = Orca::new(0, 1, &params! {"hf": true}, &Params::new());
        let got = orca
            .read_output(dir.path(), &h2(), &Settings::default())
            .unwrap();
        assert!((got.energy - -1.1284436 * HARTREE).abs() < 1e-8);
        let atoms = got.final_atoms.unwrap();
        assert_eq!(atoms.atoms[1].coord, [0.0, 0.0, 0.7122]);

        std::fs::remove_file(dir.path().join(GEOM_FILE)).unwrap();
        let got = orca
            .read_output(dir.path(), &h2(), &Settings::default())
            .unwrap();
        assert!(got.final_atoms.is_none());

        std::fs::write(dir.path().join(LOG_FILE), "ERROR !!!\n").unwrap();
        let got = orca.read_output(dir.path(), &h2(), &Settings::default());
        assert!(matches!(got, Err(ProgramError::ErrorInOutput(_))));
    }
}
