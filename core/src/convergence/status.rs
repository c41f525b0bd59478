//! Status-output parsers for the external CLIs.
//!
//! ZooKeeper's four-letter words and zkCli, and netstat, speak ad hoc text
//! protocols. Every match string the cluster waits on lives here, so the
//! coupling to those tools' exact output is centralised and testable instead
//! of being inlined at each call site.

/// Settled role of a ZooKeeper node, from `echo stat | nc <host> <port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZkMode {
    Leader,
    Follower,
    Standalone,
}

/// Parse the `Mode:` line of `stat` output. Returns `None` while the node is
/// still electing (or the output is garbage).
pub fn parse_mode(output: &str) -> Option<ZkMode> {
    if output.contains("Mode: leader") {
        Some(ZkMode::Leader)
    } else if output.contains("Mode: follower") {
        Some(ZkMode::Follower)
    } else if output.contains("Mode: standalone") {
        Some(ZkMode::Standalone)
    } else {
        None
    }
}

/// Whether a node reports a settled ensemble role. This is the quorum
/// readiness predicate: leader or follower, not a pre-election state.
/// (Standalone is deliberately excluded — a standalone node means the
/// ensemble config did not take.)
pub fn is_settled_mode(output: &str) -> bool {
    matches!(parse_mode(output), Some(ZkMode::Leader) | Some(ZkMode::Follower))
}

/// Whether `echo ruok | nc <host> <port>` answered positively.
pub fn health_ok(output: &str) -> bool {
    output.contains("imok")
}

/// Parse the `numChildren = N` stat field out of zkCli `get` output.
pub fn parse_num_children(output: &str) -> Option<usize> {
    let rest = &output[output.find("numChildren = ")? + "numChildren = ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Whether the port probe reported a listening socket. The probe command
/// greps netstat for the port and prints `no` when nothing matches, so any
/// other non-empty output means the port is listened on.
pub fn port_is_listening(output: &str) -> bool {
    let trimmed = output.trim();
    !trimmed.is_empty() && trimmed != "no"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
