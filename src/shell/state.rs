//! Session state shared by builtins and the launcher.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// The shell's working directory.
///
/// Spawned processes start here and `pwd` prints it. Only `cd` changes it;
/// the process-wide OS working directory is never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    cwd: PathBuf,
}

impl ShellState {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    /// Seed from the directory the shell was started in.
    pub fn from_process() -> io::Result<Self> {
        Ok(Self::new(env::current_dir()?))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub(super) fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = cwd;
    }
}
