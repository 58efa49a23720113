//! pipesh - interactive shell with builtins and pipelines
//!
//! Usage:
//!   pipesh                  Interactive shell (or read lines from stdin)
//!   pipesh -c "command"     Run one line

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use pipesh::config::{self, Cli, ShellConfig};
use pipesh::interrupt;
use pipesh::shell::input::LineReader;
use pipesh::Shell;

fn load_pipeshrc(shell: &mut Shell, explicit: bool) {
    let Some(path) = shell.config().rc_path.clone() else {
        return;
    };

    match shell.load_rc(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound && !explicit => {}
        Err(e) => shell.diagnostic(&format!("{}: {}", path.display(), e)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing(cli.verbose);

    let config = ShellConfig::resolve(&cli)?;
    if let Err(e) = interrupt::install() {
        warn!("could not install SIGINT handler: {}", e);
    }

    let mut shell = Shell::new(config).context("failed to read the current directory")?;
    load_pipeshrc(&mut shell, cli.rc.is_some());

    if let Some(line) = cli.command.as_deref() {
        shell.dispatch(line);
        return Ok(());
    }

    let mut reader = LineReader::from_stdin();
    shell.run(&mut reader);
    Ok(())
}
