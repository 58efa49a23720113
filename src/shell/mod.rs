//! Shell core module

pub mod builtin;
pub mod error;
pub mod executor;
pub mod input;
pub mod parser;
pub mod path;
pub mod state;

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use colored::Colorize;
use tracing::debug;

use crate::config::ShellConfig;
use crate::interrupt;

use builtin::Builtin;
use error::ShellError;
use executor::{IoStreams, Launcher};
use input::{InputResult, LineReader};
use state::ShellState;

/// One shell session: working directory, launcher and the streams every
/// command and diagnostic is written to.
pub struct Shell {
    state: ShellState,
    config: ShellConfig,
    launcher: Launcher,
    io: IoStreams,
    color: bool,
    last_status: i32,
}

impl Shell {
    /// Session on the process's own streams, starting in the OS working directory.
    pub fn new(config: ShellConfig) -> io::Result<Self> {
        let state = ShellState::from_process()?;
        Ok(Self::with_io(config, state, IoStreams::inherit()))
    }

    pub fn with_io(config: ShellConfig, state: ShellState, io: IoStreams) -> Self {
        let color = io.stderr.is_inherit() && io::stderr().is_terminal();
        Self {
            state,
            launcher: Launcher::new(config.strategy),
            config,
            io,
            color,
            last_status: 0,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Status of the last dispatched line (`128 + n` for a signal death).
    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    /// Parse and run one line. Blank and comment lines are no-ops.
    pub fn execute(&mut self, line: &str) -> Result<(), ShellError> {
        if parser::is_blank(line) {
            return Ok(());
        }

        let pipeline = parser::parse(line)?;
        debug!(stages = pipeline.len(), "parsed");

        if let Some(stage) = pipeline.single() {
            if let Some(builtin) = Builtin::lookup(stage.program()) {
                let mut out = self.io.stdout.try_clone()?.into_writer();
                run_builtin(builtin, stage.args(), &mut self.state, &mut out)?;
                self.last_status = 0;
                return Ok(());
            }
        }

        let outcome = self
            .launcher
            .launch(&pipeline, self.state.cwd(), self.io.try_clone()?)?;
        if !outcome.success() {
            debug!(%outcome, "pipeline failed");
        }
        self.last_status = outcome.status_code();
        Ok(())
    }

    /// Run one line and report any error. The session always continues.
    pub fn dispatch(&mut self, line: &str) {
        if let Err(err) = self.execute(line) {
            self.fail(&err);
            self.report(&err);
        }
    }

    fn fail(&mut self, err: &ShellError) {
        self.last_status = match err {
            ShellError::Parse(_) => 2,
            ShellError::CommandNotFound { .. } => 127,
            ShellError::Spawn { .. } => 126,
            _ => 1,
        };
    }

    pub fn report(&self, err: &ShellError) {
        self.diagnostic(&err.to_string());
    }

    /// Write `pipesh: <message>` as one line to the error stream.
    pub fn diagnostic(&self, message: &str) {
        let prefix = if self.color {
            "pipesh:".red().bold().to_string()
        } else {
            "pipesh:".to_string()
        };
        let mut err = match self.io.stderr.try_clone() {
            Ok(stream) => stream.into_error_writer(),
            Err(_) => Box::new(io::stderr()),
        };
        let _ = writeln!(err, "{} {}", prefix, message);
        let _ = err.flush();
    }

    /// `<cwd> $ `, or nothing when quiet.
    pub fn prompt(&self) -> String {
        if self.config.quiet {
            return String::new();
        }
        let cwd = self.state.cwd().display().to_string();
        if self.color {
            format!("{} {}", cwd.cyan(), self.config.prompt)
        } else {
            format!("{} {}", cwd, self.config.prompt)
        }
    }

    /// Read and dispatch lines until end-of-input.
    pub fn run(&mut self, reader: &mut LineReader) {
        loop {
            let prompt = self.prompt();
            match reader.read_line(&prompt) {
                Ok(InputResult::Line(line)) => {
                    self.dispatch(&line);
                    if interrupt::take() && reader.is_interactive() {
                        self.newline();
                    }
                }
                Ok(InputResult::Interrupt) => continue,
                Ok(InputResult::Eof) => break,
                Err(e) => {
                    self.diagnostic(&format!("input error: {}", e));
                    break;
                }
            }
        }
        debug!(status = self.last_status, "session ended");
    }

    fn newline(&self) {
        if let Ok(stream) = self.io.stdout.try_clone() {
            let mut out = stream.into_writer();
            let _ = writeln!(out);
            let _ = out.flush();
        }
    }

    /// Run a startup file line by line. Errors are reported with their
    /// file and line number and never stop the remaining lines.
    pub fn load_rc(&mut self, path: &Path) -> io::Result<()> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading startup file");

        for (idx, line) in content.lines().enumerate() {
            if parser::is_blank(line) {
                continue;
            }
            if let Err(err) = self.execute(line) {
                self.fail(&err);
                self.diagnostic(&format!("{}:{}: {}", path.display(), idx + 1, err));
            }
        }
        Ok(())
    }
}

/// Run `builtin` and flush `out`. The builtin's own error wins over a flush failure.
fn run_builtin(builtin: Builtin, args: &[String], state: &mut ShellState, out: &mut dyn Write) -> Result<(), ShellError> {
    let result = builtin.run(args, state, out);
    let flushed = out.flush();
    result?;
    flushed?;
    Ok(())
}
