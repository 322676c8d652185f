use std::{path::Path, sync::OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::{
    dicts::{merge_with, Params},
    geom::{Atom, Atoms},
    settings::Settings,
};

use super::{read_file, value_string, Program, ProgramError, ProgramResult};

#[cfg(test)]
mod tests;

pub const INCAR: &str = "INCAR";
pub const POSCAR: &str = "POSCAR";
pub const KPOINTS: &str = "KPOINTS";
pub const OUTCAR: &str = "OUTCAR";
pub const CONTCAR: &str = "CONTCAR";
pub const LOG_FILE: &str = "vasp.out";

/// keys handled by the calculator instead of being written to the INCAR
const NOT_INCAR: [&str; 2] = ["kpts", "auto_dipole"];

static CELL: OnceLock<[Regex; 2]> = OnceLock::new();

/// A VASP calculator. POTCAR generation is left to the VASP installation, so
/// only INCAR, POSCAR and (with `kpts`) KPOINTS are written
#[derive(Debug, Clone)]
pub struct Vasp {
    params: Params,
}

impl Vasp {
    /// merge `flags` on top of `preset`, with null values in `flags` removing
    /// preset keys. `auto_dipole: true` is replaced by a dipole correction
    /// along the third lattice vector centered on the center of mass of
    /// `atoms`
    pub fn new(atoms: &Atoms, preset: Option<&Params>, flags: &Params) -> Self {
        let mut params = merge_with([preset, Some(flags)], true);
        if params.get("auto_dipole") == Some(&Value::Bool(true)) {
            params.insert("ldipol".into(), true.into());
            params.insert("idipol".into(), 3.into());
            if let Some(com) = atoms.center_of_mass_fractional() {
                params.insert("dipol".into(), com.to_vec().into());
            }
        }
        Self { params }
    }

    /// the INCAR contents
    fn incar(&self) -> Result<String, ProgramError> {
        use std::fmt::Write;
        let mut body = String::new();
        for (key, val) in &self.params {
            if NOT_INCAR.contains(&key.as_str()) || val.is_null() {
                continue;
            }
            let v = match val {
                Value::Bool(true) => ".TRUE.".to_owned(),
                Value::Bool(false) => ".FALSE.".to_owned(),
                v => value_string(v, " ").ok_or_else(|| {
                    ProgramError::InvalidParameter(key.clone())
                })?,
            };
            writeln!(body, "{} = {v}", key.to_uppercase()).unwrap();
        }
        Ok(body)
    }

    fn kpoints(&self) -> Result<Option<String>, ProgramError> {
        let Some(kpts) = self.params.get("kpts") else {
            return Ok(None);
        };
        let err = || ProgramError::InvalidParameter("kpts".to_owned());
        let grid = kpts
            .as_array()
            .filter(|k| k.len() == 3 && k.iter().all(Value::is_u64))
            .ok_or_else(err)?;
        let grid = value_string(&Value::Array(grid.clone()), " ")
            .ok_or_else(err)?;
        Ok(Some(format!("Automatic mesh\n0\nGamma\n{grid}\n0 0 0\n")))
    }

    fn is_relaxation(&self) -> bool {
        self.params
            .get("nsw")
            .and_then(Value::as_i64)
            .is_some_and(|n| n > 0)
    }
}

pub fn write_poscar(atoms: &Atoms) -> Result<String, ProgramError> {
    use std::fmt::Write;
    let cell = atoms.cell.ok_or(ProgramError::MissingCell)?;
    let runs = atoms.runs();
    let mut body = String::new();
    let labels: Vec<_> = runs.iter().map(|(l, _)| *l).collect();
    let counts: Vec<_> = runs.iter().map(|(_, n)| n.to_string()).collect();
    writeln!(body, "{}", atoms.formula()).unwrap();
    writeln!(body, "1.0").unwrap();
    for row in cell {
        writeln!(body, "{:20.12}{:20.12}{:20.12}", row[0], row[1], row[2])
            .unwrap();
    }
    writeln!(body, "{}", labels.join(" ")).unwrap();
    writeln!(body, "{}", counts.join(" ")).unwrap();
    writeln!(body, "Cartesian").unwrap();
    for atom in &atoms.atoms {
        let [x, y, z] = atom.coord;
        writeln!(body, "{x:20.12}{y:20.12}{z:20.12}").unwrap();
    }
    Ok(body)
}

/// parse a POSCAR or CONTCAR. species names are taken from the file when it
/// has a species line and from `reference` otherwise
pub fn read_poscar(
    s: &str,
    reference: &Atoms,
    name: &str,
) -> Result<Atoms, ProgramError> {
    let err = || ProgramError::GeomParseError(name.to_owned());
    let mut lines = s.lines().skip(1);
    let scale: f64 = lines
        .next()
        .and_then(|l| l.split_whitespace().next()?.parse().ok())
        .ok_or_else(err)?;
    let mut cell = [[0.0; 3]; 3];
    for row in &mut cell {
        let line = lines.next().ok_or_else(err)?;
        let c = super::coord_fields(line, 0).ok_or_else(err)?;
        *row = c.map(|x| x * scale);
    }
    let mut line = lines.next().ok_or_else(err)?;
    let species: Option<Vec<&str>> =
        if line.split_whitespace().all(|f| f.parse::<usize>().is_err()) {
            let ret = line.split_whitespace().collect();
            line = lines.next().ok_or_else(err)?;
            Some(ret)
        } else {
            None
        };
    let counts = line
        .split_whitespace()
        .map(|f| f.parse::<usize>().map_err(|_| err()))
        .collect::<Result<Vec<_>, _>>()?;
    let natoms: usize = counts.iter().sum();
    let mut mode = lines.next().ok_or_else(err)?.trim();
    if mode.starts_with(['S', 's']) {
        mode = lines.next().ok_or_else(err)?.trim();
    }
    let direct = !mode.starts_with(['C', 'c', 'K', 'k']);

    let labels: Vec<String> = match species {
        Some(species) => {
            if species.len() != counts.len() {
                return Err(err());
            }
            species
                .iter()
                .zip(&counts)
                .flat_map(|(s, n)| std::iter::repeat(s.to_string()).take(*n))
                .collect()
        }
        None => reference.atoms.iter().map(|a| a.label.clone()).collect(),
    };
    if labels.len() != natoms {
        return Err(err());
    }

    let mut atoms = Vec::with_capacity(natoms);
    for label in labels {
        let line = lines.next().ok_or_else(err)?;
        let c = super::coord_fields(line, 0).ok_or_else(err)?;
        let coord = if direct {
            let mut ret = [0.0; 3];
            for (i, r) in ret.iter_mut().enumerate() {
                *r = (0..3).map(|j| c[j] * cell[j][i]).sum();
            }
            ret
        } else {
            c.map(|x| x * scale)
        };
        atoms.push(Atom {
            label,
            coord,
        });
    }
    Ok(Atoms::with_cell(atoms, cell))
}

impl Program for Vasp {
    fn name(&self) -> &'static str {
        "VASP"
    }

    fn parameters(&self) -> &Params {
        &self.params
    }

    fn build_input(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<(String, String)>, ProgramError> {
        let mut ret = vec![
            (INCAR.to_owned(), self.incar()?),
            (POSCAR.to_owned(), write_poscar(atoms)?),
        ];
        if let Some(kpts) = self.kpoints()? {
            ret.push((KPOINTS.to_owned(), kpts));
        }
        Ok(ret)
    }

    fn command(&self, settings: &Settings) -> String {
        let cmd = format!("{} {}", settings.vasp_parallel_cmd, settings.vasp_cmd);
        format!("{} > {LOG_FILE}", cmd.trim())
    }

    /// reads the last free energy from the OUTCAR and the final structure from
    /// the CONTCAR. with `check_convergence`, relaxations must also have
    /// reached the requested accuracy
    fn read_output(
        &self,
        dir: &Path,
        atoms: &Atoms,
        settings: &Settings,
    ) -> Result<ProgramResult, ProgramError> {
        let (contents, outname) = read_file(dir, OUTCAR)?;
        let [energy_re, converged_re] = CELL.get_or_init(|| {
            [
                Regex::new(r"free\s+energy\s+TOTEN\s+=").unwrap(),
                Regex::new(r"reached required accuracy").unwrap(),
            ]
        });
        let mut energy = None;
        for line in contents.lines().filter(|l| energy_re.is_match(l)) {
            //   free  energy   TOTEN  =       -14.22096025 eV
            let e = line
                .split('=')
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| ProgramError::EnergyParseError(outname.clone()))?;
            energy = Some(e);
        }
        let Some(energy) = energy else {
            return Err(ProgramError::EnergyNotFound(outname));
        };
        if settings.check_convergence
            && self.is_relaxation()
            && !converged_re.is_match(&contents)
        {
            return Err(ProgramError::Unconverged(outname));
        }
        let final_atoms = match read_file(dir, CONTCAR) {
            Ok((s, name)) if !s.trim().is_empty() => {
                Some(read_poscar(&s, atoms, &name)?)
            }
            _ => None,
        };
        Ok(ProgramResult {
            energy,
            final_atoms,
        })
    }
}
