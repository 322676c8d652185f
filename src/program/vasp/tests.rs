use std::path::Path;

use insta::assert_snapshot;
use serde_json::json;

use crate::{
    geom::{Atom, Atoms},
    params,
    program::{Program, ProgramError},
    settings::Settings,
};

use super::*;

fn cu() -> Atoms {
    Atoms::with_cell(
        vec![Atom::new("Cu", 0.0, 0.0, 0.0), Atom::new("Cu", 1.8, 1.8, 1.8)],
        [[3.6, 0.0, 0.0], [0.0, 3.6, 0.0], [0.0, 0.0, 3.6]],
    )
}

/// copy the canned VASP outputs into a fresh directory, taking the OUTCAR
/// from `outcar`
fn output_dir(outcar: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = Path::new("testfiles/vasp");
    std::fs::copy(src.join(outcar), dir.path().join(OUTCAR)).unwrap();
    std::fs::copy(src.join(CONTCAR), dir.path().join(CONTCAR)).unwrap();
    dir
}

#[test]
fn incar() {
    let preset = params! {"encut": 520, "ismear": 0, "sigma": 0.05, "lreal": "Auto"};
    let flags = params! {
        "ismear": -5,
        "laechg": true,
        "lcharg": true,
        "lreal": false,
        "lwave": true,
        "nedos": 5001,
        "nsw": 0,
        "sigma": null,
        "magmom": [1.0, 1.0],
    };
    let vasp = Vasp::new(&cu(), Some(&preset), &flags);
    assert!(!vasp.parameters().contains_key("sigma"));
    let incar = vasp.incar().unwrap();
    assert_snapshot!("incar", incar);

    let files = vasp.build_input(&cu()).unwrap();
    let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, [INCAR, POSCAR]);
}

#[test]
fn no_preset() {
    let vasp = Vasp::new(&cu(), None, &params! {"nsw": 0, "isym": null});
    assert_eq!(vasp.incar().unwrap(), "NSW = 0\n");
}

#[test]
fn auto_dipole() {
    let slab = Atoms::with_cell(
        vec![Atom::new("Cu", 0.0, 0.0, 1.0), Atom::new("Cu", 0.0, 0.0, 3.0)],
        [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 20.0]],
    );
    let vasp = Vasp::new(&slab, None, &params! {"auto_dipole": true});
    let p = vasp.parameters();
    assert_eq!(p["ldipol"], json!(true));
    assert_eq!(p["idipol"], json!(3));
    let dipol: Vec<f64> = serde_json::from_value(p["dipol"].clone()).unwrap();
    assert!((dipol[2] - 0.1).abs() < 1e-12);
    let incar = vasp.incar().unwrap();
    assert!(incar.contains("LDIPOL = .TRUE.\nIDIPOL = 3\nDIPOL = "));
    assert!(!incar.contains("AUTO_DIPOLE"));

    let vasp = Vasp::new(&slab, None, &params! {"auto_dipole": false});
    assert!(!vasp.parameters().contains_key("ldipol"));
}

#[test]
fn kpoints() {
    let vasp = Vasp::new(&cu(), None, &params! {"kpts": [4, 4, 2]});
    let files = vasp.build_input(&cu()).unwrap();
    let (name, got) = &files[2];
    assert_eq!(name, KPOINTS);
    assert_eq!(got, "Automatic mesh\n0\nGamma\n4 4 2\n0 0 0\n");
    assert!(!files[0].1.contains("KPTS"));

    let vasp = Vasp::new(&cu(), None, &params! {"kpts": [4, 4]});
    assert!(matches!(
        vasp.build_input(&cu()),
        Err(ProgramError::InvalidParameter(_))
    ));
}

#[test]
fn poscar() {
    let got = write_poscar(&cu()).unwrap();
    let lines: Vec<_> = got.lines().collect();
    assert_eq!(lines[0], "Cu2");
    assert_eq!(lines[5], "Cu");
    assert_eq!(lines[6], "2");
    assert_eq!(lines[7], "Cartesian");
    let back = read_poscar(&got, &Atoms::default(), "POSCAR").unwrap();
    assert_eq!(back.atoms.len(), 2);
    for (a, b) in back.atoms.iter().zip(&cu().atoms) {
        assert_eq!(a.label, b.label);
        for (x, y) in a.coord.iter().zip(b.coord) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    assert!(matches!(
        write_poscar(&Atoms::new(cu().atoms)),
        Err(ProgramError::MissingCell)
    ));
}

#[test]
fn poscar_without_species() {
    let s = "comment
1.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
1 1
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.0 0.0 F F F
";
    let reference = Atoms::new(vec![
        Atom::new("Na", 0.0, 0.0, 0.0),
        Atom::new("Cl", 0.0, 0.0, 0.0),
    ]);
    let got = read_poscar(s, &reference, "POSCAR").unwrap();
    assert_eq!(got.atoms[1], Atom::new("Cl", 1.0, 0.0, 0.0));
    assert!(read_poscar("comment\n1.0\n", &reference, "POSCAR").is_err());
}

#[test]
fn read_output() {
    let dir = output_dir(OUTCAR);
    let vasp = Vasp::new(&cu(), None, &params! {"nsw": 200});
    let got = vasp
        .read_output(dir.path(), &cu(), &Settings::default())
        .unwrap();
    assert_eq!(got.energy, -7.21096025);
    let atoms = got.final_atoms.unwrap();
    assert_eq!(atoms.atoms[1], Atom::new("Cu", 1.8, 1.8, 1.8));
    assert_eq!(atoms.cell, cu().cell);
}

#[test]
fn unconverged() {
    let dir = output_dir("OUTCAR.unconverged");
    let relax = Vasp::new(&cu(), None, &params! {"nsw": 200});
    let got = relax.read_output(dir.path(), &cu(), &Settings::default());
    assert!(matches!(got, Err(ProgramError::Unconverged(_))));

    let lax = Settings {
        check_convergence: false,
        ..Settings::default()
    };
    assert!(relax.read_output(dir.path(), &cu(), &lax).is_ok());

    let stat = Vasp::new(&cu(), None, &params! {"nsw": 0});
    let got = stat.read_output(dir.path(), &cu(), &Settings::default());
    assert!(got.is_ok());
}

#[test]
fn command() {
    let vasp = Vasp::new(&cu(), None, &params! {});
    let mut s = Settings::default();
    assert_eq!(vasp.command(&s), "vasp_std > vasp.out");
    s.vasp_parallel_cmd = "srun -N 1 --ntasks-per-node 48".to_owned();
    assert_eq!(
        vasp.command(&s),
        "srun -N 1 --ntasks-per-node 48 vasp_std > vasp.out"
    );
}
