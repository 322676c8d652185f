use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use nalgebra as na;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseGeomError {
    #[error("wrong number of fields in atom line `{0}`")]
    Fields(String),

    #[error("failed to parse coordinate `{0}` as f64")]
    Coord(String),

    #[error("malformed Lattice in `{0}`")]
    Lattice(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub label: String,
    pub coord: [f64; 3],
}

impl Atom {
    pub fn new(label: &str, x: f64, y: f64, z: f64) -> Self {
        Self {
            label: label.to_string(),
            coord: [x, y, z],
        }
    }

    fn element(&self) -> Option<&'static (&'static str, usize, f64)> {
        ELEMENTS
            .iter()
            .find(|(l, _, _)| l.eq_ignore_ascii_case(&self.label))
    }

    /// atomic mass in amu, or 1.0 for elements missing from the table
    pub fn mass(&self) -> f64 {
        self.element().map(|(_, _, m)| *m).unwrap_or(1.0)
    }

    pub fn atomic_number(&self) -> Option<usize> {
        self.element().map(|(_, z, _)| *z)
    }
}

impl FromStr for Atom {
    type Err = ParseGeomError;

    /// parse an Atom from a line like
    ///  C 1.0 1.0 1.0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<_> = s.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(ParseGeomError::Fields(s.to_owned()));
        }
        let mut coord = [0.0; 3];
        for (c, f) in coord.iter_mut().zip(&fields[1..]) {
            *c = f
                .parse()
                .map_err(|_| ParseGeomError::Coord(f.to_string()))?;
        }
        Ok(Self {
            label: fields[0].to_string(),
            coord,
        })
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:2} {:15.10} {:15.10} {:15.10}",
            self.label, self.coord[0], self.coord[1], self.coord[2]
        )
    }
}

/// A structure handed to a calculator. `cell` holds the lattice vectors as
/// rows and is only needed by periodic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Atoms {
    pub atoms: Vec<Atom>,
    pub cell: Option<[[f64; 3]; 3]>,
}

impl Display for Atoms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.atoms.len())?;
        if let Some(cell) = &self.cell {
            let v: Vec<_> = cell.iter().flatten().map(f64::to_string).collect();
            writeln!(f, "Lattice=\"{}\"", v.join(" "))?;
        } else {
            writeln!(f)?;
        }
        for atom in &self.atoms {
            writeln!(f, "{atom}")?;
        }
        Ok(())
    }
}

impl FromStr for Atoms {
    type Err = ParseGeomError;

    /// parse an XYZ file. the count and comment lines are optional, and a
    /// `Lattice="..."` entry in the comment line sets the cell like extended
    /// XYZ
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut atoms = Vec::new();
        let mut cell = None;
        let mut lines = s.lines().filter(|l| !l.trim().is_empty()).peekable();
        if let Some(first) = lines.peek() {
            if first.trim().parse::<usize>().is_ok() {
                lines.next();
                // the comment line may be blank, so look at the raw lines
                // again to tell whether it was skipped above
                let comment = s
                    .lines()
                    .skip_while(|l| l.trim().is_empty())
                    .nth(1)
                    .unwrap_or_default();
                if !comment.trim().is_empty() {
                    lines.next();
                }
                cell = parse_lattice(comment)?;
            }
        }
        for line in lines {
            atoms.push(line.parse()?);
        }
        Ok(Self { atoms, cell })
    }
}

fn parse_lattice(comment: &str) -> Result<Option<[[f64; 3]; 3]>, ParseGeomError> {
    let Some(start) = comment.find("Lattice=\"") else {
        return Ok(None);
    };
    let rest = &comment[start + 9..];
    let err = || ParseGeomError::Lattice(comment.to_owned());
    let end = rest.find('"').ok_or_else(err)?;
    let vals = rest[..end]
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|_| err()))
        .collect::<Result<Vec<_>, _>>()?;
    if vals.len() != 9 {
        return Err(err());
    }
    let mut cell = [[0.0; 3]; 3];
    for (i, v) in vals.into_iter().enumerate() {
        cell[i / 3][i % 3] = v;
    }
    Ok(Some(cell))
}

impl Atoms {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms, cell: None }
    }

    pub fn with_cell(atoms: Vec<Atom>, cell: [[f64; 3]; 3]) -> Self {
        Self {
            atoms,
            cell: Some(cell),
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// the formula with elements in alphabetical order and every count
    /// written out, like `C4 H4 O6`
    pub fn formula(&self) -> String {
        let mut counts = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.label.as_str()).or_insert(0) += 1;
        }
        counts
            .iter()
            .map(|(l, c)| format!("{l}{c}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// runs of consecutive atoms with the same label, in order. this is the
    /// grouping used in POSCAR species and count lines
    pub fn runs(&self) -> Vec<(&str, usize)> {
        let mut ret: Vec<(&str, usize)> = Vec::new();
        for atom in &self.atoms {
            match ret.last_mut() {
                Some((l, n)) if *l == atom.label => *n += 1,
                _ => ret.push((atom.label.as_str(), 1)),
            }
        }
        ret
    }

    fn lattice(&self) -> Option<na::Matrix3<f64>> {
        let c = self.cell.as_ref()?;
        Some(na::Matrix3::from_row_slice(&[
            c[0][0], c[0][1], c[0][2], c[1][0], c[1][1], c[1][2], c[2][0],
            c[2][1], c[2][2],
        ]))
    }

    /// the number of electrons at total `charge`, or None if any atom is not
    /// a known element
    pub fn nelectrons(&self, charge: i64) -> Option<i64> {
        let mut protons = 0;
        for atom in &self.atoms {
            protons += atom.atomic_number()? as i64;
        }
        Some(protons - charge)
    }

    /// the center of mass in Cartesian coordinates
    pub fn center_of_mass(&self) -> [f64; 3] {
        let mut com = na::Vector3::zeros();
        let mut total = 0.0;
        for atom in &self.atoms {
            let m = atom.mass();
            com += m * na::Vector3::from(atom.coord);
            total += m;
        }
        if total > 0.0 {
            com /= total;
        }
        com.into()
    }

    /// the center of mass in fractional coordinates of the cell, or None if
    /// there is no cell or it is singular
    pub fn center_of_mass_fractional(&self) -> Option<[f64; 3]> {
        let inv = self.lattice()?.try_inverse()?;
        let com = na::RowVector3::from(self.center_of_mass());
        let frac = com * inv;
        Some([frac[0], frac[1], frac[2]])
    }
}

/// symbol, atomic number and mass
const ELEMENTS: &[(&str, usize, f64)] = &[
    ("H", 1, 1.008),
    ("He", 2, 4.0026),
    ("Li", 3, 6.94),
    ("Be", 4, 9.0122),
    ("B", 5, 10.81),
    ("C", 6, 12.011),
    ("N", 7, 14.007),
    ("O", 8, 15.999),
    ("F", 9, 18.998),
    ("Ne", 10, 20.180),
    ("Na", 11, 22.990),
    ("Mg", 12, 24.305),
    ("Al", 13, 26.982),
    ("Si", 14, 28.085),
    ("P", 15, 30.974),
    ("S", 16, 32.06),
    ("Cl", 17, 35.45),
    ("Ar", 18, 39.948),
    ("K", 19, 39.098),
    ("Ca", 20, 40.078),
    ("Sc", 21, 44.956),
    ("Ti", 22, 47.867),
    ("V", 23, 50.942),
    ("Cr", 24, 51.996),
    ("Mn", 25, 54.938),
    ("Fe", 26, 55.845),
    ("Co", 27, 58.933),
    ("Ni", 28, 58.693),
    ("Cu", 29, 63.546),
    ("Zn", 30, 65.38),
    ("Ga", 31, 69.723),
    ("Ge", 32, 72.630),
    ("As", 33, 74.922),
    ("Se", 34, 78.971),
    ("Br", 35, 79.904),
    ("Kr", 36, 83.798),
    ("Mo", 42, 95.95),
    ("Ru", 44, 101.07),
    ("Rh", 45, 102.91),
    ("Pd", 46, 106.42),
    ("Ag", 47, 107.87),
    ("W", 74, 183.84),
    ("Ir", 77, 192.22),
    ("Pt", 78, 195.08),
    ("Au", 79, 196.97),
    ("I", 53, 126.90),
];
