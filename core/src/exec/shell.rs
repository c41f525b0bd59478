//! Remote command execution over SSH.
//!
//! `RemoteShell` wraps a [`CommandRunner`] with the cluster's SSH settings
//! and runs command strings on remote hosts. The remote command is always
//! passed as a single quoted argument so the remote shell handles pipes,
//! redirects, and heredocs. Strictness is per call: `run` fails on a
//! non-zero exit, `run_tolerant` returns whatever the command produced.

use crate::cluster::config::SshSettings;
use crate::exec::runner::{CommandOutput, CommandRunner, ExecError};

/// Executes commands on remote hosts (and locally, for scp/wget) through an
/// injected runner.
pub struct RemoteShell {
    ssh: SshSettings,
    runner: Box<dyn CommandRunner>,
}

impl RemoteShell {
    pub fn new(ssh: SshSettings, runner: Box<dyn CommandRunner>) -> Self {
        RemoteShell { ssh, runner }
    }

    /// The full local shell command that runs `cmd` on `host` over SSH.
    pub fn ssh_command(&self, host: &str, cmd: &str) -> String {
        format!(
            "ssh {} {} {}",
            self.ssh.base_args().join(" "),
            self.ssh.user_at(host),
            quote(cmd)
        )
    }

    /// The local shell command that copies `local_path` into `remote_dir` on
    /// `host` via scp.
    pub fn scp_command(&self, local_path: &str, host: &str, remote_dir: &str) -> String {
        let mut args = vec!["-P".to_string(), self.ssh.port.to_string()];
        if let Some(ref key) = self.ssh.identity_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        format!(
            "scp {} {} {}:{}/",
            args.join(" "),
            local_path,
            self.ssh.user_at(host),
            remote_dir
        )
    }

    /// Run `cmd` on `host`. A non-zero exit status is an error.
    pub fn run(&self, host: &str, cmd: &str) -> Result<CommandOutput, ExecError> {
        strict(self.runner.run(&self.ssh_command(host, cmd)))
    }

    /// Run `cmd` on `host`, tolerating a non-zero exit status. Only a failure
    /// to execute at all (connection refused, auth failure) is an error.
    pub fn run_tolerant(&self, host: &str, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.runner.run(&self.ssh_command(host, cmd))
    }

    /// Run `cmd` on `host` under sudo. Non-zero exit is an error.
    pub fn sudo(&self, host: &str, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.run(host, &format!("sudo {}", cmd))
    }

    /// Run `cmd` on `host` under sudo, tolerating a non-zero exit status.
    pub fn sudo_tolerant(&self, host: &str, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.run_tolerant(host, &format!("sudo {}", cmd))
    }

    /// Run a command on the local machine (wget, scp). Non-zero exit is an error.
    pub fn run_local(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        strict(self.runner.run(cmd))
    }

    /// Copy a local file into a remote directory via scp.
    pub fn copy(&self, local_path: &str, host: &str, remote_dir: &str) -> Result<CommandOutput, ExecError> {
        strict(self.runner.run(&self.scp_command(local_path, host, remote_dir)))
    }
}

fn strict(result: Result<CommandOutput, ExecError>) -> Result<CommandOutput, ExecError> {
    let output = result?;
    if output.success() {
        Ok(output)
    } else {
        Err(ExecError::NonZeroExit {
            exit_code: output.exit_code,
            stderr: output.stderr,
        })
    }
}

/// Single-quote `cmd` for embedding in a local shell line, escaping any
/// embedded single quotes.
fn quote(cmd: &str) -> String {
    format!("'{}'", cmd.replace('\'', r"'\''"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::runner::MockRunner;

    fn shell_with(runner: MockRunner) -> RemoteShell {
        RemoteShell::new(SshSettings::default(), Box::new(runner))
    }

    // -- Command building --

    #[test]
    fn ssh_command_wraps_remote_command_in_quotes() {
        let shell = shell_with(MockRunner::new());
        let cmd = shell.ssh_command("vm110", "echo stat | nc localhost 2181 | grep Mode:");
        assert!(cmd.starts_with("ssh -p 22"));
        assert!(cmd.contains("ubuntu@vm110"));
        assert!(cmd.ends_with("'echo stat | nc localhost 2181 | grep Mode:'"));
    }

    #[test]
    fn ssh_command_escapes_single_quotes() {
        let shell = shell_with(MockRunner::new());
        let cmd = shell.ssh_command("vm110", "echo 'hi'");
        assert!(cmd.ends_with(r"'echo '\''hi'\'''"));
    }

    #[test]
    fn ssh_command_includes_identity_file() {
        let ssh = SshSettings {
            user: "deploy".into(),
            port: 2222,
            identity_file: Some("/keys/id_rsa".into()),
        };
        let shell = RemoteShell::new(ssh, Box::new(MockRunner::new()));
        let cmd = shell.ssh_command("vm110", "hostname");
        assert!(cmd.contains("-i /keys/id_rsa"));
        assert!(cmd.contains("-p 2222"));
        assert!(cmd.contains("deploy@vm110"));
    }

    #[test]
    fn scp_command_targets_remote_dir() {
        let shell = shell_with(MockRunner::new());
        let cmd = shell.scp_command("zookeeper-3.4.5.tar.gz", "vm110", "/home/ubuntu/solrig");
        assert_eq!(
            cmd,
            "scp -P 22 zookeeper-3.4.5.tar.gz ubuntu@vm110:/home/ubuntu/solrig/"
        );
    }

    // -- Strict vs tolerant execution --

    #[test]
    fn run_fails_on_non_zero_exit() {
        let runner = MockRunner::with_outputs(vec![Ok(CommandOutput::failed(1, "no such service"))]);
        let shell = shell_with(runner);
        let err = shell.run("vm110", "service nope status").unwrap_err();
        assert!(matches!(err, ExecError::NonZeroExit { exit_code: 1, .. }));
    }

    #[test]
    fn run_tolerant_returns_failed_output() {
        let runner = MockRunner::with_outputs(vec![Ok(CommandOutput::failed(1, "grep: no match"))]);
        let shell = shell_with(runner);
        let out = shell.run_tolerant("vm110", "grep Mode:").unwrap();
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn run_tolerant_still_surfaces_spawn_errors() {
        let runner = MockRunner::with_outputs(vec![Err(ExecError::Spawn("sh missing".into()))]);
        let shell = shell_with(runner);
        assert!(shell.run_tolerant("vm110", "hostname").is_err());
    }

    #[test]
    fn sudo_prefixes_command() {
        let runner = std::sync::Arc::new(MockRunner::new());
        let shell = RemoteShell::new(SshSettings::default(), Box::new(runner.clone()));
        shell.sudo("vm110", "service solrig_zookeeper start").unwrap();
        let cmds = runner.executed_commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains("'sudo service solrig_zookeeper start'"));
    }
}
