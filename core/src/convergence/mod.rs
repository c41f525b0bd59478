//! Cluster readiness polling.
//!
//! The `poller` module is the single generic retry loop: probe every target
//! once per round, sleep a fixed interval, stop on the first all-ready round
//! or when an optional wall-clock budget runs out. The `status` module
//! centralises the substring contracts of the external CLIs so no match
//! string is inlined at a call site. The `waits` module applies the one loop
//! to the three readiness questions: quorum, registration, port.

pub mod poller;
pub mod status;
pub mod waits;

pub use poller::{
    Convergence, ConvergencePoller, PollClock, PollPolicy, PollResult, ProbeError,
    ProbeErrorPolicy, WaitError,
};
