//! Error taxonomy for one dispatched input line.
//!
//! Every variant renders as a single diagnostic line. The shell loop
//! reports it and goes back to reading; nothing here ends a session.

use std::env;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Malformed pipeline syntax. The line is rejected before anything spawns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: empty line")]
    Empty,
    #[error("syntax error: empty pipeline stage {}", .index + 1)]
    EmptyStage { index: usize },
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Missing or invalid arguments to a builtin.
    #[error("{builtin}: {message}")]
    BuiltinArgument {
        builtin: &'static str,
        message: String,
    },

    /// The program could not be resolved on PATH (or, with a `/`, in the cwd).
    #[error("{program}: command not found")]
    CommandNotFound { program: String },

    /// The program exists but could not be started.
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Signal delivery to `pid` failed.
    #[error("kill: ({pid}): {message}")]
    Signal { pid: i32, message: String },

    #[error("ps: {0}")]
    ProcessListing(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ShellError {
    pub fn builtin_arg(builtin: &'static str, message: impl Into<String>) -> Self {
        ShellError::BuiltinArgument {
            builtin,
            message: message.into(),
        }
    }

    /// Classify a failed spawn of `program` in `cwd`.
    ///
    /// `NotFound` only means "command not found" when the program itself
    /// cannot be resolved; a vanished working directory or a missing script
    /// interpreter also reports `NotFound` and keeps the OS message.
    pub fn spawn(program: &str, cwd: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            if !cwd.is_dir() {
                return ShellError::Spawn {
                    program: program.to_string(),
                    source: io::Error::new(
                        source.kind(),
                        format!("working directory {}: {}", cwd.display(), source),
                    ),
                };
            }
            if which::which_in(program, env::var_os("PATH"), cwd).is_err() {
                return ShellError::CommandNotFound {
                    program: program.to_string(),
                };
            }
        }
        ShellError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}
