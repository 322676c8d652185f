use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{dicts::Params, geom::Atoms, runner::Calculation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// final energy in eV
    pub energy: f64,
}

/// The document a recipe returns: what was run, on what, and what came out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub name: String,
    pub parameters: Params,
    pub natoms: usize,
    pub formula: String,

    /// the final structure, or the input structure when the engine did not
    /// report one
    pub atoms: Atoms,
    pub input_atoms: Atoms,
    pub results: Results,

    /// reported by the molecular recipes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin_multiplicity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nelectrons: Option<i64>,

    /// where the job's files were gathered
    pub dir: PathBuf,

    /// the first relaxation of a double relaxation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax1: Option<Box<Summary>>,
}

impl Summary {
    pub fn new(name: &str, parameters: &Params, calc: Calculation) -> Self {
        let atoms = calc.final_atoms().clone();
        Self {
            name: name.to_owned(),
            parameters: parameters.clone(),
            natoms: atoms.len(),
            formula: atoms.formula(),
            atoms,
            input_atoms: calc.input_atoms,
            results: Results {
                energy: calc.result.energy,
            },
            charge: None,
            spin_multiplicity: None,
            nelectrons: None,
            dir: calc.dir,
            relax1: None,
        }
    }

    /// record the charge and spin multiplicity of a molecular calculation,
    /// along with the electron count of the final structure
    pub fn with_charge_mult(mut self, charge: i64, mult: i64) -> Self {
        self.charge = Some(charge);
        self.spin_multiplicity = Some(mult);
        self.nelectrons = self.atoms.nelectrons(charge);
        self
    }
}
