//! Command execution layer.
//!
//! `runner` defines the `CommandRunner` trait with the production shell
//! implementation and a recording mock. `shell` wraps a runner with SSH
//! settings to run commands on remote hosts, with per-call control over
//! whether a non-zero exit status is an error.

pub mod runner;
pub mod shell;

pub use runner::{CommandOutput, CommandRunner, ExecError, MockRunner, ShellRunner};
pub use shell::RemoteShell;
