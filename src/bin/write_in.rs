//! write the input files an engine would receive for a structure into the
//! current directory
//!
//! usage: write_in <engine> <geometry.xyz> [params.json]

use std::{env, path::Path, process::exit};

use cookbook::{dicts::Params, geom::Atoms, program::from_name};
use log::error;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("usage: {} <engine> <geometry.xyz> [params.json]", args[0]);
        exit(1);
    }

    let atoms: Atoms = match std::fs::read_to_string(&args[2]) {
        Ok(s) => match s.parse() {
            Ok(a) => a,
            Err(e) => {
                error!("failed to parse {}: {e}", args[2]);
                exit(1);
            }
        },
        Err(e) => {
            error!("failed to read {}: {e}", args[2]);
            exit(1);
        }
    };

    let params: Params = match args.get(3) {
        Some(f) => {
            let parsed = std::fs::read_to_string(f)
                .map_err(|e| e.to_string())
                .and_then(|s| {
                    serde_json::from_str(&s).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(p) => p,
                Err(e) => {
                    error!("failed to load parameters from {f}: {e}");
                    exit(1);
                }
            }
        }
        None => Params::new(),
    };

    let Some(program) = from_name(&args[1], &atoms, params) else {
        error!("unrecognized engine `{}`", args[1]);
        exit(1);
    };
    if let Err(e) = program.write_input(Path::new("."), &atoms) {
        error!("failed to write {} input: {e}", program.name());
        exit(1);
    }
}
