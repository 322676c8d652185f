use std::path::Path;

use insta::assert_snapshot;

use crate::{
    geom::{Atom, Atoms},
    params,
    program::{Program, ProgramError, HARTREE},
    settings::Settings,
};

use super::{Gaussian, LOG_FILE};

fn water() -> Atoms {
    Atoms::new(vec![
        Atom::new("O", 0.0, 0.0, 0.119262),
        Atom::new("H", 0.0, 0.763239, -0.477047),
        Atom::new("H", 0.0, -0.763239, -0.477047),
    ])
}

fn static_params() -> crate::dicts::Params {
    params! {
        "mem": "16GB",
        "chk": "Gaussian.chk",
        "nprocshared": 4,
        "xc": "wb97x-d",
        "basis": "def2-tzvp",
        "charge": 0,
        "mult": 1,
        "sp": "",
        "scf": ["maxcycle=250", "xqc"],
        "integral": "ultrafine",
        "nosymmetry": "",
        "pop": "CM5",
        "gfinput": "",
        "ioplist": ["6/7=3", "2/9=2000"],
    }
}

/// copy the canned log `name` into a fresh directory as the job's log file
fn log_dir(name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        Path::new("testfiles/gaussian").join(name),
        dir.path().join(LOG_FILE),
    )
    .unwrap();
    dir
}

#[test]
fn static_input() {
    let g = Gaussian::new(static_params());
    let files = g.build_input(&water()).unwrap();
    assert_eq!(files.len(), 1);
    let (name, got) = &files[0];
    assert_eq!(name, "Gaussian.com");
    assert!(got.ends_with("\n\n"));
    assert_snapshot!("static_input", got);
}

#[test]
fn route_keywords() {
    let g = Gaussian::new(params! {
        "method": "hf",
        "opt": "",
        "freq": false,
        "pop": ["hirshfeld", "cm5"],
        "maxdisk": 100,
        "charge": -1,
        "mult": 2,
    });
    let got = g.route().unwrap();
    assert_eq!(got, "#P hf opt pop(hirshfeld,cm5) maxdisk=100");
    let deck = &g.build_input(&water()).unwrap()[0].1;
    assert!(deck.contains("\n-1 2\n"));
    assert!(!deck.contains('%'));
}

#[test]
fn nested_route_value() {
    let g = Gaussian::new(params! {"xc": "pbe", "scf": {"maxcycle": 10}});
    assert!(matches!(
        g.build_input(&water()),
        Err(ProgramError::InvalidParameter(k)) if k == "scf"
    ));
}

#[test]
fn xc_and_method() {
    let g = Gaussian::new(params! {"xc": "pbe", "method": "hf", "sp": ""});
    assert!(matches!(
        g.build_input(&water()),
        Err(ProgramError::InvalidParameter(k)) if k == "method"
    ));
}

#[test]
fn read_relax() {
    let dir = log_dir("relax.log");
    let g = Gaussian::new(static_params());
    let got = g
        .read_output(dir.path(), &water(), &Settings::default())
        .unwrap();
    assert!((got.energy - -76.3870045512 * HARTREE).abs() < 1e-8);
    let atoms = got.final_atoms.unwrap();
    assert_eq!(atoms.atoms[0], Atom::new("O", 0.0, 0.0, 0.1175));
    assert_eq!(atoms.atoms[2], Atom::new("H", 0.0, -0.758, -0.47));
}

#[test]
fn read_errors() {
    let g = Gaussian::new(static_params());
    let s = Settings::default();
    let dir = log_dir("error.log");
    let got = g.read_output(dir.path(), &water(), &s).unwrap_err();
    assert!(got.is_error_in_output());

    let dir = log_dir("noenergy.log");
    let got = g.read_output(dir.path(), &water(), &s);
    assert!(matches!(got, Err(ProgramError::EnergyNotFound(_))));

    let dir = tempfile::tempdir().unwrap();
    let got = g.read_output(dir.path(), &water(), &s);
    assert!(matches!(got, Err(ProgramError::FileNotFound(_))));
}

#[test]
fn command() {
    let g = Gaussian::new(static_params());
    let s = Settings {
        gaussian_cmd: "g09".to_owned(),
        ..Settings::default()
    };
    assert_eq!(g.command(&s), "g09 < Gaussian.com > Gaussian.log");
}
