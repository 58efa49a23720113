//! Process launcher - runs external commands and pipelines
//!
//! A single external command runs with the shell's streams passed straight
//! through. A multi-stage pipeline wires stage N's stdout to stage N+1's
//! stdin using one of two strategies:
//!
//! - [`LaunchStrategy::Streaming`]: every stage is spawned up front and
//!   adjacent stages share an OS pipe. Data flows as it is produced and
//!   memory use is bounded by the pipe buffer.
//! - [`LaunchStrategy::Buffered`]: stages run one after another; each stage's
//!   whole output is collected and then fed to the next one. Simpler to
//!   reason about, but fully sequential and memory grows with the
//!   intermediate output.
//!
//! Both deliver the last stage's output to the pipeline's stdout and report
//! the last stage's exit status.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread;

use os_pipe::{PipeReader, PipeWriter};
use thiserror::Error;
use tracing::debug;

use super::error::ShellError;
use super::parser::{Command as Stage, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchStrategy {
    #[default]
    Streaming,
    Buffered,
}

#[derive(Debug, Error)]
#[error("unknown pipeline strategy '{0}' (expected 'streaming' or 'buffered')")]
pub struct UnknownStrategy(pub String);

impl FromStr for LaunchStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(LaunchStrategy::Streaming),
            "buffered" | "buffer" => Ok(LaunchStrategy::Buffered),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchStrategy::Streaming => write!(f, "streaming"),
            LaunchStrategy::Buffered => write!(f, "buffered"),
        }
    }
}

/// How a stage's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Exited(i32),
    /// Terminated by the given signal number.
    Signaled(i32),
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        matches!(self, StageOutcome::Exited(0))
    }

    /// Shell-style numeric status: exit code, or 128 + signal number.
    pub fn status_code(&self) -> i32 {
        match self {
            StageOutcome::Exited(code) => *code,
            StageOutcome::Signaled(signal) => 128 + signal,
        }
    }
}

impl From<ExitStatus> for StageOutcome {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return StageOutcome::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return StageOutcome::Signaled(signal);
            }
        }
        StageOutcome::Exited(-1)
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Exited(code) => write!(f, "exit status {}", code),
            StageOutcome::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

#[derive(Debug)]
pub enum InputStream {
    Inherit,
    Null,
    Pipe(PipeReader),
}

impl InputStream {
    pub fn try_clone(&self) -> io::Result<InputStream> {
        Ok(match self {
            InputStream::Inherit => InputStream::Inherit,
            InputStream::Null => InputStream::Null,
            InputStream::Pipe(r) => InputStream::Pipe(r.try_clone()?),
        })
    }

    fn into_stdio(self) -> Stdio {
        match self {
            InputStream::Inherit => Stdio::inherit(),
            InputStream::Null => Stdio::null(),
            InputStream::Pipe(r) => Stdio::from(r),
        }
    }
}

#[derive(Debug)]
pub enum OutputStream {
    Inherit,
    Null,
    Pipe(PipeWriter),
}

impl OutputStream {
    pub fn try_clone(&self) -> io::Result<OutputStream> {
        Ok(match self {
            OutputStream::Inherit => OutputStream::Inherit,
            OutputStream::Null => OutputStream::Null,
            OutputStream::Pipe(w) => OutputStream::Pipe(w.try_clone()?),
        })
    }

    fn into_stdio(self) -> Stdio {
        match self {
            OutputStream::Inherit => Stdio::inherit(),
            OutputStream::Null => Stdio::null(),
            OutputStream::Pipe(w) => Stdio::from(w),
        }
    }

    /// In-process writer over this stream. `Inherit` writes to our own stdout.
    pub fn into_writer(self) -> Box<dyn Write + Send> {
        match self {
            OutputStream::Inherit => Box::new(io::stdout()),
            OutputStream::Null => Box::new(io::sink()),
            OutputStream::Pipe(w) => Box::new(w),
        }
    }

    /// Like [`OutputStream::into_writer`], but `Inherit` means our own stderr.
    pub fn into_error_writer(self) -> Box<dyn Write + Send> {
        match self {
            OutputStream::Inherit => Box::new(io::stderr()),
            other => other.into_writer(),
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, OutputStream::Inherit)
    }
}

/// The three standard streams handed to a command.
#[derive(Debug)]
pub struct IoStreams {
    pub stdin: InputStream,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
}

impl IoStreams {
    pub fn new(stdin: InputStream, stdout: OutputStream, stderr: OutputStream) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    pub fn inherit() -> Self {
        Self::new(InputStream::Inherit, OutputStream::Inherit, OutputStream::Inherit)
    }

    pub fn try_clone(&self) -> io::Result<IoStreams> {
        Ok(IoStreams {
            stdin: self.stdin.try_clone()?,
            stdout: self.stdout.try_clone()?,
            stderr: self.stderr.try_clone()?,
        })
    }
}

/// Spawns the external stages of one pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Launcher {
    strategy: LaunchStrategy,
}

impl Launcher {
    pub fn new(strategy: LaunchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> LaunchStrategy {
        self.strategy
    }

    /// Run every stage of `pipeline` as an external process in `cwd`.
    ///
    /// Returns the last stage's outcome, or the spawn error of the first
    /// stage that could not be started.
    pub fn launch(&self, pipeline: &Pipeline, cwd: &Path, io: IoStreams) -> Result<StageOutcome, ShellError> {
        match pipeline.single() {
            Some(stage) => run_single(stage, cwd, io),
            None => match self.strategy {
                LaunchStrategy::Streaming => run_streaming(pipeline.stages(), cwd, io),
                LaunchStrategy::Buffered => run_buffered(pipeline.stages(), cwd, io),
            },
        }
    }
}

fn spawn_stage(stage: &Stage, cwd: &Path, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Result<Child, ShellError> {
    let child = Command::new(stage.program())
        .args(stage.args())
        .current_dir(cwd)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| ShellError::spawn(stage.program(), cwd, e))?;

    debug!(program = stage.program(), pid = child.id(), cwd = %cwd.display(), "spawned");
    Ok(child)
}

fn wait_stage(program: &str, child: &mut Child) -> Result<StageOutcome, ShellError> {
    let outcome = StageOutcome::from(child.wait()?);
    debug!(program, pid = child.id(), %outcome, "stage finished");
    Ok(outcome)
}

/// One external command with the shell's streams passed straight through.
pub fn run_single(stage: &Stage, cwd: &Path, io: IoStreams) -> Result<StageOutcome, ShellError> {
    let mut child = spawn_stage(
        stage,
        cwd,
        io.stdin.into_stdio(),
        io.stdout.into_stdio(),
        io.stderr.into_stdio(),
    )?;
    wait_stage(stage.program(), &mut child)
}

/// Stages spawned before a later stage failed to start are left running.
/// Our pipe ends are already gone, so they see EOF or EPIPE; a detached
/// thread reaps them once they exit.
fn abandon(children: Vec<(String, Child)>) {
    if children.is_empty() {
        return;
    }
    let pids: Vec<u32> = children.iter().map(|(_, c)| c.id()).collect();
    debug!(?pids, "pipeline aborted; earlier stages left running");
    thread::spawn(move || {
        for (_, mut child) in children {
            let _ = child.wait();
        }
    });
}

/// Streams for stage `idx`: read from the previous stage's pipe (or the
/// pipeline's stdin), write into a fresh pipe (or the pipeline's stdout).
fn wire_stage(prev: Option<PipeReader>, is_last: bool, io: &IoStreams) -> io::Result<(IoStreams, Option<PipeReader>)> {
    let stdin = match prev {
        Some(r) => InputStream::Pipe(r),
        None => io.stdin.try_clone()?,
    };
    let (stdout, next_reader) = if is_last {
        (io.stdout.try_clone()?, None)
    } else {
        let (r, w) = os_pipe::pipe()?;
        (OutputStream::Pipe(w), Some(r))
    };
    Ok((IoStreams::new(stdin, stdout, io.stderr.try_clone()?), next_reader))
}

fn run_streaming(stages: &[Stage], cwd: &Path, io: IoStreams) -> Result<StageOutcome, ShellError> {
    let mut children: Vec<(String, Child)> = Vec::with_capacity(stages.len());
    let mut prev_reader: Option<PipeReader> = None;

    for (idx, stage) in stages.iter().enumerate() {
        let is_last = idx + 1 == stages.len();

        let (stage_io, next_reader) = match wire_stage(prev_reader.take(), is_last, &io) {
            Ok(wired) => wired,
            Err(e) => {
                abandon(children);
                return Err(e.into());
            }
        };
        prev_reader = next_reader;

        // The Command owning our copies of the pipe ends is dropped inside
        // spawn_stage, so only the children keep them open.
        let spawned = spawn_stage(
            stage,
            cwd,
            stage_io.stdin.into_stdio(),
            stage_io.stdout.into_stdio(),
            stage_io.stderr.into_stdio(),
        );
        match spawned {
            Ok(child) => children.push((stage.program().to_string(), child)),
            Err(e) => {
                abandon(children);
                return Err(e);
            }
        }
    }
    // Release the pipeline's own stream handles before blocking on the stages.
    drop(io);

    wait_all(children)
}

/// Wait on every stage, even after a failed wait, and return the last
/// stage's outcome or the first failure.
fn wait_all(children: Vec<(String, Child)>) -> Result<StageOutcome, ShellError> {
    let mut last = StageOutcome::Exited(0);
    let mut first_err = None;
    for (program, mut child) in children {
        match wait_stage(&program, &mut child) {
            Ok(outcome) => last = outcome,
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    first_err.map_or(Ok(last), Err)
}

fn run_buffered(stages: &[Stage], cwd: &Path, io: IoStreams) -> Result<StageOutcome, ShellError> {
    let mut carried: Option<Vec<u8>> = None;
    let mut last = StageOutcome::Exited(0);

    for (idx, stage) in stages.iter().enumerate() {
        let is_last = idx + 1 == stages.len();

        let stdin = match carried {
            Some(_) => Stdio::piped(),
            None => io.stdin.try_clone()?.into_stdio(),
        };
        let stdout = if is_last {
            io.stdout.try_clone()?.into_stdio()
        } else {
            Stdio::piped()
        };
        let stderr = io.stderr.try_clone()?.into_stdio();

        let mut child = spawn_stage(stage, cwd, stdin, stdout, stderr)?;

        // Feed from a separate thread so a stage that writes before it has
        // read all of its input cannot deadlock against us.
        let feeder = match (carried.take(), child.stdin.take()) {
            (Some(buf), Some(mut pipe)) => Some(thread::spawn(move || {
                if let Err(e) = pipe.write_all(&buf) {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        debug!("pipeline: feeding stage input failed: {}", e);
                    }
                }
            })),
            _ => None,
        };

        let mut captured = Vec::new();
        let read_result = match child.stdout.take() {
            Some(mut out) => out.read_to_end(&mut captured).map(|_| ()),
            None => Ok(()),
        };

        last = wait_stage(stage.program(), &mut child)?;
        if let Some(handle) = feeder {
            let _ = handle.join();
        }
        read_result?;

        if !is_last {
            carried = Some(captured);
        }
    }

    Ok(last)
}
