//! The three readiness waits, all built on the same poller.
//!
//! Quorum and registration retry indefinitely by default on the assumption
//! that quorum formation always eventually succeeds; both accept an explicit
//! `max_wait` via the policy. The port wait is the only one with an enforced
//! budget.

use std::time::Duration;

use crate::convergence::poller::{
    Convergence, ConvergencePoller, PollPolicy, ProbeError, WaitError,
};
use crate::convergence::status;
use crate::exec::RemoteShell;
use crate::tasks::{system, zookeeper};

pub const QUORUM_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const PORT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const PORT_MAX_WAIT: Duration = Duration::from_secs(60);

pub fn quorum_policy() -> PollPolicy {
    PollPolicy::unbounded(QUORUM_POLL_INTERVAL)
}

pub fn registration_policy() -> PollPolicy {
    PollPolicy::unbounded(REGISTRATION_POLL_INTERVAL)
}

pub fn port_policy() -> PollPolicy {
    PollPolicy::bounded(PORT_POLL_INTERVAL, PORT_MAX_WAIT)
}

/// Wait until every ZooKeeper node reports a settled leader/follower role.
pub fn wait_for_quorum(
    shell: &RemoteShell,
    hosts: &[String],
    client_port: u16,
    policy: PollPolicy,
) -> Result<Convergence, WaitError> {
    let cmd = zookeeper::mode_probe_command(client_port);
    let mut poller = ConvergencePoller::new("zookeeper quorum", policy);
    poller.run(
        hosts,
        |host| probe(shell, host, &cmd),
        status::is_settled_mode,
    )
}

/// Wait until the registration path on the registry node holds exactly
/// `expected` children (one per live Solr node).
pub fn wait_for_registration(
    shell: &RemoteShell,
    registry_host: &str,
    zookeeper_dir: &str,
    registration_path: &str,
    expected: usize,
    policy: PollPolicy,
) -> Result<Convergence, WaitError> {
    let cmd = zookeeper::zkcli_command(zookeeper_dir, &format!("get {}", registration_path));
    let targets = vec![registry_host.to_string()];
    let what = format!("{} registrations at {}", expected, registration_path);
    let mut poller = ConvergencePoller::new(&what, policy);
    poller.run(
        &targets,
        |host| probe(shell, host, &cmd),
        |out| status::parse_num_children(out) == Some(expected),
    )
}

/// Wait until `port` is listened on at `host`. Unlike the other waits this
/// enforces its budget: exceeding it fails with `PortNotListening`.
pub fn wait_for_port(
    shell: &RemoteShell,
    host: &str,
    port: u16,
    policy: PollPolicy,
) -> Result<Convergence, WaitError> {
    let cmd = system::port_probe_command(port);
    let targets = vec![host.to_string()];
    let what = format!("port {} on {}", port, host);
    let mut poller = ConvergencePoller::new(&what, policy);
    poller
        .run(
            &targets,
            |target| probe(shell, target, &cmd),
            status::port_is_listening,
        )
        .map_err(|e| match e {
            WaitError::TimedOut { elapsed, .. } => WaitError::PortNotListening {
                host: host.to_string(),
                port,
                elapsed,
            },
            other => other,
        })
}

/// Probe errors never distinguish "connection refused" from "not ready" at
/// this layer; the poller's probe-error policy decides.
fn probe(shell: &RemoteShell, host: &str, cmd: &str) -> Result<String, ProbeError> {
    shell
        .run_tolerant(host, cmd)
        .map(|out| out.stdout)
        .map_err(|e| ProbeError::new(host, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
