//! pipesh - a small interactive shell
//!
//! Features:
//! - Builtins: cd, pwd, echo, kill, ps
//! - `|` pipelines, streamed through OS pipes or buffered stage by stage
//! - Ctrl+C interrupts the running command, never the shell

pub mod config;
pub mod interrupt;
pub mod shell;

pub use shell::Shell;
