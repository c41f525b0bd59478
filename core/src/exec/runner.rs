//! Command runner abstraction for executing shell commands.
//!
//! `CommandRunner` is the trait the orchestrator uses to execute commands.
//! `ShellRunner` is the production implementation that spawns `sh -c`.
//! `MockRunner` is the test double that records calls and returns preset
//! outputs. Unlike a plain success/failure split, runners preserve the exit
//! code so callers can decide per call whether a non-zero exit is fatal.

use std::process::Command;
use std::sync::{Arc, Mutex};

use thiserror::Error;

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Captured result of a completed command, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// A successful output with the given stdout (used heavily in tests).
    pub fn ok(stdout: &str) -> Self {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ---------------------------------------------------------------------------
// ExecError
// ---------------------------------------------------------------------------

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be spawned at all.
    #[error("failed to execute command: {0}")]
    Spawn(String),
    /// The command ran but exited non-zero, and the caller did not tolerate it.
    #[error("command exited with status {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Trait for executing shell command strings.
///
/// A runner never interprets the exit code — it reports it in the
/// [`CommandOutput`] and lets the caller decide.
pub trait CommandRunner: Send {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError>;
}

/// Shared runners delegate, so tests can keep a handle to a mock they have
/// already handed to a `RemoteShell`.
impl<R: CommandRunner + Sync> CommandRunner for Arc<R> {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        (**self).run(cmd)
    }
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| ExecError::Spawn(e.to_string()))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// Test-double runner that records commands and returns pre-configured outputs.
///
/// Outputs are consumed in the order given; once exhausted, every call
/// returns an empty successful output.
pub struct MockRunner {
    outputs: Mutex<Vec<Result<CommandOutput, ExecError>>>,
    commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            outputs: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(outputs: Vec<Result<CommandOutput, ExecError>>) -> Self {
        let mut reversed = outputs;
        reversed.reverse();
        MockRunner {
            outputs: Mutex::new(reversed),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: preset a sequence of successful stdout strings.
    pub fn with_stdout(lines: Vec<&str>) -> Self {
        Self::with_outputs(lines.into_iter().map(|s| Ok(CommandOutput::ok(s))).collect())
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.commands.lock().unwrap().push(cmd.to_string());
        match self.outputs.lock().unwrap().pop() {
            Some(output) => output,
            None => Ok(CommandOutput::ok("")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
