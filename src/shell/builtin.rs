//! Built-in commands
//!
//! These run inside the shell process and only when they are the sole
//! stage of a line. In a multi-stage pipeline the same names resolve to
//! external programs.
//!
//! | name | args | effect |
//! |------|------|--------|
//! | cd   | path | set the shell's working directory |
//! | pwd  | none | print the shell's working directory |
//! | echo | any  | print the arguments joined by spaces |
//! | kill | [-SIGNAL] pid | send a signal (default SIGTERM) |
//! | ps   | none | print the OS process table |

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::error::ShellError;
use super::path;
use super::state::ShellState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Echo,
    Kill,
    Ps,
}

/// Name to builtin lookup table. Names are case-sensitive.
const BUILTINS: &[(&str, Builtin)] = &[
    ("cd", Builtin::Cd),
    ("pwd", Builtin::Pwd),
    ("echo", Builtin::Echo),
    ("kill", Builtin::Kill),
    ("ps", Builtin::Ps),
];

/// Arguments handed to the platform `ps`.
const PS_ARGS: &[&str] = &["-e", "-o", "pid,command"];

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, builtin)| *builtin)
    }

    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(name, _)| *name)
            .unwrap_or("builtin")
    }

    /// Run with `args` (program name excluded), writing results to `out`.
    pub fn run(self, args: &[String], state: &mut ShellState, out: &mut dyn Write) -> Result<(), ShellError> {
        debug!(builtin = self.name(), ?args, "builtin");
        match self {
            Builtin::Cd => builtin_cd(state, args),
            Builtin::Pwd => builtin_pwd(state, args, out),
            Builtin::Echo => builtin_echo(args, out),
            Builtin::Kill => builtin_kill(args),
            Builtin::Ps => builtin_ps(state, args, out),
        }
    }
}

/// cd - change the shell's working directory
fn builtin_cd(state: &mut ShellState, args: &[String]) -> Result<(), ShellError> {
    let raw = match args {
        [path] => path.as_str(),
        [] => return Err(ShellError::builtin_arg("cd", "missing argument")),
        _ => return Err(ShellError::builtin_arg("cd", "too many arguments")),
    };

    let target = path::resolve(state.cwd(), raw, |dir| require_dir(raw, dir))?;
    require_dir(raw, &target)?;
    require_enterable(raw, &target)?;

    state.set_cwd(target);
    Ok(())
}

fn require_dir(raw: &str, dir: &Path) -> Result<(), ShellError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ShellError::builtin_arg("cd", format!("{}: Not a directory", raw))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ShellError::builtin_arg("cd", format!("{}: No such directory", raw)))
        }
        Err(e) => Err(ShellError::builtin_arg("cd", format!("{}: {}", raw, e))),
    }
}

/// The directory must be searchable, or every later spawn in it fails.
#[cfg(unix)]
fn require_enterable(raw: &str, dir: &Path) -> Result<(), ShellError> {
    use nix::unistd::{access, AccessFlags};

    access(dir, AccessFlags::X_OK)
        .map_err(|errno| ShellError::builtin_arg("cd", format!("{}: {}", raw, errno.desc())))
}

#[cfg(not(unix))]
fn require_enterable(raw: &str, dir: &Path) -> Result<(), ShellError> {
    fs::read_dir(dir)
        .map(|_| ())
        .map_err(|e| ShellError::builtin_arg("cd", format!("{}: {}", raw, e)))
}

/// pwd - print working directory
fn builtin_pwd(state: &ShellState, args: &[String], out: &mut dyn Write) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(ShellError::builtin_arg("pwd", "too many arguments"));
    }
    writeln!(out, "{}", state.cwd().display())?;
    Ok(())
}

/// echo - print arguments
fn builtin_echo(args: &[String], out: &mut dyn Write) -> Result<(), ShellError> {
    writeln!(out, "{}", args.join(" "))?;
    Ok(())
}

/// kill - signal a process by pid
fn builtin_kill(args: &[String]) -> Result<(), ShellError> {
    let (signal, pid_arg) = match args {
        [] => return Err(ShellError::builtin_arg("kill", "missing process id")),
        [flag, signal, pid] if flag == "-s" => (Some(signal.as_str()), pid),
        [flag, pid] if flag.len() > 1 && flag.starts_with('-') => (Some(&flag[1..]), pid),
        [pid] => (None, pid),
        _ => {
            return Err(ShellError::builtin_arg(
                "kill",
                "usage: kill [-SIGNAL | -s SIGNAL] pid",
            ))
        }
    };

    let pid = match pid_arg.parse::<i32>() {
        Ok(pid) if pid > 0 => pid,
        _ => {
            return Err(ShellError::builtin_arg(
                "kill",
                format!("{}: arguments must be process ids", pid_arg),
            ))
        }
    };

    send_signal(pid, signal)
}

#[cfg(unix)]
fn parse_signal(spec: &str) -> Option<nix::sys::signal::Signal> {
    use nix::sys::signal::Signal;

    if let Ok(number) = spec.parse::<i32>() {
        return Signal::try_from(number).ok();
    }
    let upper = spec.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    name.parse::<Signal>().ok()
}

#[cfg(unix)]
fn send_signal(pid: i32, signal: Option<&str>) -> Result<(), ShellError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let signal = match signal {
        None => Signal::SIGTERM,
        Some(spec) => parse_signal(spec).ok_or_else(|| {
            ShellError::builtin_arg("kill", format!("{}: invalid signal specification", spec))
        })?,
    };

    debug!(pid, ?signal, "kill");
    kill(Pid::from_raw(pid), signal).map_err(|errno| ShellError::Signal {
        pid,
        message: errno.desc().to_string(),
    })
}

#[cfg(not(unix))]
fn send_signal(pid: i32, _signal: Option<&str>) -> Result<(), ShellError> {
    Err(ShellError::Signal {
        pid,
        message: "signals are not supported on this platform".to_string(),
    })
}

/// ps - print the process table via the platform `ps`
fn builtin_ps(state: &ShellState, args: &[String], out: &mut dyn Write) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(ShellError::builtin_arg("ps", "too many arguments"));
    }

    let ps = which::which("ps").map_err(|_| {
        ShellError::ProcessListing("process listing unavailable (no 'ps' in PATH)".to_string())
    })?;

    let output = Command::new(&ps)
        .args(PS_ARGS)
        .current_dir(state.cwd())
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ShellError::ProcessListing(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} failed with {}", ps.display(), output.status));
        return Err(ShellError::ProcessListing(reason));
    }

    out.write_all(&output.stdout)?;
    Ok(())
}
