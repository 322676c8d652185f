//! Running a [Program] on a structure in an isolated scratch directory.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process::Command,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use chrono::Local;
use flate2::{bufread::GzDecoder, write::GzEncoder, Compression};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    geom::Atoms,
    program::{Program, ProgramError, ProgramResult},
    settings::Settings,
};

#[cfg(test)]
pub(crate) mod canned;


static COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("`{cmd}` failed: {source}")]
    Execute {
        cmd: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Something that can run a shell command inside a directory
pub trait Executor: Send + Sync {
    fn execute(&self, cmd: &str, dir: &Path) -> std::io::Result<()>;
}

/// runs commands with `sh -c`
#[derive(Debug, Default, Clone, Copy)]
pub struct Shell;

impl Executor for Shell {
    fn execute(&self, cmd: &str, dir: &Path) -> std::io::Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(dir)
            .status()?;
        if !status.success() {
            return Err(std::io::Error::other(format!("exited with {status}")));
        }
        Ok(())
    }
}

/// Everything a recipe needs besides its own arguments. Clones share the
/// executor
#[derive(Clone)]
pub struct Context {
    pub settings: Settings,
    pub executor: Arc<dyn Executor>,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        Self::with_executor(settings, Shell)
    }

    pub fn with_executor(
        settings: Settings,
        executor: impl Executor + 'static,
    ) -> Self {
        Self {
            settings,
            executor: Arc::new(executor),
        }
    }

    /// a copy of this context that gathers every job into its own
    /// subdirectory of the results directory, for recipes that run more than
    /// one job
    pub fn with_unique_workdirs(&self) -> Self {
        let mut ret = self.clone();
        ret.settings.create_unique_workdir = true;
        ret
    }
}

/// The outcome of one engine run
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    /// the structure the run started from
    pub input_atoms: Atoms,

    pub result: ProgramResult,

    /// where the job's files ended up
    pub dir: PathBuf,
}

impl Calculation {
    /// the final structure if the engine reported one, else the input
    pub fn final_atoms(&self) -> &Atoms {
        self.result.final_atoms.as_ref().unwrap_or(&self.input_atoms)
    }
}

/// a directory name that is unique within this process and, through the
/// timestamp, across processes sharing a base directory
fn unique_name(prefix: &str) -> String {
    let now = Local::now().format("%Y-%m-%d-%H-%M-%S-%6f");
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{now}-{n}")
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    // rename fails across filesystems, like a node-local scratch disk
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// write `from` to `to` as gzip and remove `from`
fn gzip_file(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut input = BufReader::new(File::open(from)?);
    let out = BufWriter::new(File::create(to)?);
    let mut enc = GzEncoder::new(out, Compression::default());
    std::io::copy(&mut input, &mut enc)?;
    enc.finish()?.flush()?;
    fs::remove_file(from)
}

fn gunzip_file(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut dec = GzDecoder::new(BufReader::new(File::open(from)?));
    let mut out = BufWriter::new(File::create(to)?);
    std::io::copy(&mut dec, &mut out)?;
    out.flush()
}

/// move every file in `from` into `to` and remove `from`. with `compress`,
/// files not already ending in `.gz` are gzipped on the way
fn gather(from: &Path, to: &Path, compress: bool) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if compress && !is_gzipped(&path) {
            let mut name = entry.file_name();
            name.push(".gz");
            let dest = to.join(name);
            debug!("compressing {} to {}", path.display(), dest.display());
            gzip_file(&path, &dest)?;
        } else {
            let dest = to.join(entry.file_name());
            debug!("moving {} to {}", path.display(), dest.display());
            move_file(&path, &dest)?;
        }
    }
    fs::remove_dir_all(from)
}

/// copy `file` into `dir`. a gzipped file, or a missing file with a gzipped
/// sibling like `WAVECAR.gz`, is decompressed instead. returns false if
/// neither exists
fn copy_in(file: &Path, dir: &Path) -> std::io::Result<bool> {
    let Some(name) = file.file_name() else {
        return Ok(false);
    };
    if file.is_file() {
        if is_gzipped(file) {
            let stem = file.file_stem().unwrap_or(name);
            gunzip_file(file, &dir.join(stem))?;
        } else {
            fs::copy(file, dir.join(name))?;
        }
        return Ok(true);
    }
    let mut gz = name.to_owned();
    gz.push(".gz");
    let gz = file.with_file_name(gz);
    if gz.is_file() {
        gunzip_file(&gz, &dir.join(name))?;
        return Ok(true);
    }
    Ok(false)
}

/// run `program` on `atoms`. `copy_files` are copied into the scratch
/// directory first, decompressing gzipped ones, and missing ones are
/// skipped. on failure the scratch directory is left in place for inspection
pub fn run_calc<P: Program + ?Sized>(
    ctx: &Context,
    program: &P,
    atoms: &Atoms,
    copy_files: &[PathBuf],
) -> Result<Calculation, RunError> {
    let settings = &ctx.settings;
    fs::create_dir_all(&settings.scratch_dir)?;
    let tmp = settings.scratch_dir.join(unique_name("tmp"));
    fs::create_dir(&tmp)?;

    for file in copy_files {
        if !copy_in(file, &tmp)? {
            warn!("{} not found, skipping copy", file.display());
        }
    }

    program.write_input(&tmp, atoms)?;
    let cmd = program.command(settings);
    info!("running {} in {}", program.name(), tmp.display());
    debug!(
        "{} parameters: {}",
        program.name(),
        serde_json::Value::Object(program.parameters().clone())
    );
    if let Err(source) = ctx.executor.execute(&cmd, &tmp) {
        warn!("{} failed, leaving {}", program.name(), tmp.display());
        return Err(RunError::Execute { cmd, source });
    }
    let result = match program.read_output(&tmp, atoms, settings) {
        Ok(r) => r,
        Err(e) => {
            warn!("{}: {e}, leaving {}", program.name(), tmp.display());
            return Err(e.into());
        }
    };

    let dir = if settings.create_unique_workdir {
        settings.results_dir.join(unique_name("job"))
    } else {
        settings.results_dir.clone()
    };
    gather(&tmp, &dir, settings.gzip_files)?;
    info!(
        "{} finished with energy {:.8} eV in {}",
        program.name(),
        result.energy,
        dir.display()
    );
    Ok(Calculation {
        input_atoms: atoms.clone(),
        result,
        dir,
    })
}
