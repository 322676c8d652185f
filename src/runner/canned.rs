use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::settings::Settings;

use super::{Context, Executor};

/// An [Executor] that copies canned output files into the working directory
/// instead of running anything. The commands it was asked to run and the
/// files present at that point are recorded, and clones share the records
#[derive(Clone, Default)]
pub(crate) struct Canned {
    outputs: Vec<(PathBuf, String)>,
    fail: bool,
    commands: Arc<Mutex<Vec<String>>>,
    inputs: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Canned {
    /// `outputs` pairs a fixture under `testfiles/` with the name it should
    /// have in the working directory
    pub(crate) fn new(outputs: &[(&str, &str)]) -> Self {
        Self {
            outputs: outputs
                .iter()
                .map(|(src, dst)| {
                    (Path::new("testfiles").join(src), dst.to_string())
                })
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// the sorted file names in the working directory of each run
    pub(crate) fn inputs(&self) -> Vec<Vec<String>> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Executor for Canned {
    fn execute(&self, cmd: &str, dir: &Path) -> std::io::Result<()> {
        self.commands.lock().unwrap().push(cmd.to_owned());
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
            .collect::<Result<_, _>>()?;
        files.sort();
        self.inputs.lock().unwrap().push(files);
        if self.fail {
            return Err(std::io::Error::other("exited with exit status: 1"));
        }
        for (src, dst) in &self.outputs {
            std::fs::copy(src, dir.join(dst))?;
        }
        Ok(())
    }
}

/// a [Context] that runs everything in `root` with `executor` and otherwise
/// default settings, so every job is gathered into the same results
/// directory and gzipped
pub(crate) fn default_context(root: &Path, executor: Canned) -> Context {
    let settings = Settings {
        scratch_dir: root.join("scratch"),
        results_dir: root.join("results"),
        ..Settings::default()
    };
    Context::with_executor(settings, executor)
}

/// like [default_context], but giving every job its own results directory
/// and leaving the files uncompressed
pub(crate) fn context(root: &Path, executor: Canned) -> Context {
    let mut ret = default_context(root, executor);
    ret.settings.create_unique_workdir = true;
    ret.settings.gzip_files = false;
    ret
}

/// the decompressed contents of the gzip file at `path`
pub(crate) fn read_gz(path: &Path) -> String {
    use std::io::Read;
    let file = std::fs::File::open(path).unwrap();
    let mut ret = String::new();
    flate2::read::GzDecoder::new(file)
        .read_to_string(&mut ret)
        .unwrap();
    ret
}
