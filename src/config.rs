//! Command line, environment and startup-file settings.
//!
//! Precedence: command line, then environment, then defaults.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::shell::executor::LaunchStrategy;

/// Selects the launcher strategy (`streaming` or `buffered`).
pub const PIPELINE_ENV: &str = "PIPESH_PIPELINE";
/// Overrides the `$ ` part of the prompt.
pub const PROMPT_ENV: &str = "PIPESH_PROMPT";
/// `tracing` filter directives.
pub const LOG_ENV: &str = "PIPESH_LOG";

pub const DEFAULT_PROMPT: &str = "$ ";
const RC_FILE: &str = ".pipeshrc";

#[derive(Debug, Default, Parser)]
#[command(name = "pipesh", version, about = "Interactive shell with builtins and pipelines")]
pub struct Cli {
    /// Run one line and exit
    #[arg(short = 'c', value_name = "LINE")]
    pub command: Option<String>,

    /// Run each pipeline stage to completion before starting the next
    #[arg(long)]
    pub buffered: bool,

    /// Do not read the startup file
    #[arg(long)]
    pub norc: bool,

    /// Startup file to read instead of ~/.pipeshrc
    #[arg(long, value_name = "PATH", conflicts_with = "norc")]
    pub rc: Option<PathBuf>,

    /// Do not print a prompt
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub strategy: LaunchStrategy,
    pub prompt: String,
    pub quiet: bool,
    pub rc_path: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            strategy: LaunchStrategy::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            quiet: false,
            rc_path: default_rc_path(),
        }
    }
}

impl ShellConfig {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let strategy = if cli.buffered {
            LaunchStrategy::Buffered
        } else if let Some(value) = env(PIPELINE_ENV) {
            value
                .parse()
                .with_context(|| format!("invalid {}", PIPELINE_ENV))?
        } else {
            LaunchStrategy::default()
        };

        let rc_path = if cli.norc {
            None
        } else {
            cli.rc.clone().or_else(default_rc_path)
        };

        Ok(Self {
            strategy,
            prompt: env(PROMPT_ENV).unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            quiet: cli.quiet,
            rc_path,
        })
    }
}

pub fn default_rc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(RC_FILE))
}

/// Log to stderr, filtered by `PIPESH_LOG` (default `warn`, `debug` when verbose).
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ShellConfig::resolve_with(&Cli::default(), env_of(&[])).unwrap();
        assert_eq!(config.strategy, LaunchStrategy::Streaming);
        assert_eq!(config.prompt, "$ ");
        assert!(!config.quiet);
        assert_eq!(config.rc_path, default_rc_path());
    }

    #[test]
    fn test_env_selects_strategy_and_prompt() {
        let env = env_of(&[(PIPELINE_ENV, "buffered"), (PROMPT_ENV, "> ")]);
        let config = ShellConfig::resolve_with(&Cli::default(), env).unwrap();
        assert_eq!(config.strategy, LaunchStrategy::Buffered);
        assert_eq!(config.prompt, "> ");
    }

    #[test]
    fn test_flag_beats_env() {
        let cli = Cli {
            buffered: true,
            ..Cli::default()
        };
        let env = env_of(&[(PIPELINE_ENV, "streaming")]);
        let config = ShellConfig::resolve_with(&cli, env).unwrap();
        assert_eq!(config.strategy, LaunchStrategy::Buffered);
    }

    #[test]
    fn test_bad_strategy_is_error() {
        let env = env_of(&[(PIPELINE_ENV, "parallel")]);
        let err = ShellConfig::resolve_with(&Cli::default(), env).unwrap_err();
        assert!(err.to_string().contains(PIPELINE_ENV));
    }

    #[test]
    fn test_rc_selection() {
        let cli = Cli {
            norc: true,
            ..Cli::default()
        };
        assert_eq!(ShellConfig::resolve_with(&cli, env_of(&[])).unwrap().rc_path, None);

        let cli = Cli {
            rc: Some(PathBuf::from("/etc/pipeshrc")),
            ..Cli::default()
        };
        assert_eq!(
            ShellConfig::resolve_with(&cli, env_of(&[])).unwrap().rc_path,
            Some(PathBuf::from("/etc/pipeshrc"))
        );
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["pipesh", "-c", "echo hi", "--buffered", "-q"]).unwrap();
        assert_eq!(cli.command.as_deref(), Some("echo hi"));
        assert!(cli.buffered);
        assert!(cli.quiet);
        assert!(Cli::try_parse_from(["pipesh", "--norc", "--rc", "x"]).is_err());
    }
}
