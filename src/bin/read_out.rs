//! parse an engine's output files and print the result as JSON
//!
//! usage: read_out <engine> <dir> <geometry.xyz>

use std::{env, path::Path, process::exit};

use cookbook::{
    dicts::Params, geom::Atoms, program::from_name, settings::Settings,
};
use log::error;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: {} <engine> <dir> <geometry.xyz>", args[0]);
        exit(1);
    }

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };
    let atoms: Atoms = match std::fs::read_to_string(&args[3]) {
        Ok(s) => match s.parse() {
            Ok(a) => a,
            Err(e) => {
                error!("failed to parse {}: {e}", args[3]);
                exit(1);
            }
        },
        Err(e) => {
            error!("failed to read {}: {e}", args[3]);
            exit(1);
        }
    };
    let Some(program) = from_name(&args[1], &atoms, Params::new()) else {
        error!("unrecognized engine `{}`", args[1]);
        exit(1);
    };
    match program.read_output(Path::new(&args[2]), &atoms, &settings) {
        Ok(res) => match serde_json::to_string_pretty(&res) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                error!("{e}");
                exit(1);
            }
        },
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
