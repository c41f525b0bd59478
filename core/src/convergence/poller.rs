//! The convergence poller — one bounded-retry loop for every readiness wait.
//!
//! Given a set of targets, an injected probe, and a readiness predicate, the
//! poller probes every target once per round (sequentially) and sleeps a
//! fixed interval between rounds. It returns as soon as one round passes for
//! all targets. Time is reached only through the [`PollClock`] seam, so tests
//! drive the loop without ever sleeping.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A probe failed to execute: connection refused, auth failure, or a
/// non-zero exit the probe did not tolerate.
#[derive(Debug, Clone, Error)]
#[error("probe of '{target}' failed: {message}")]
pub struct ProbeError {
    pub target: String,
    pub message: String,
}

impl ProbeError {
    pub fn new(target: &str, message: impl std::fmt::Display) -> Self {
        ProbeError {
            target: target.to_string(),
            message: message.to_string(),
        }
    }
}

/// Terminal failures of a polling loop.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The configured maximum wait elapsed without convergence.
    #[error("timed out waiting for {waiting_for} after {elapsed:?}")]
    TimedOut {
        waiting_for: String,
        elapsed: Duration,
    },
    /// A TCP port never reached the listening state within its wait budget.
    #[error("port {port} on '{host}' still not listening after {elapsed:?}")]
    PortNotListening {
        host: String,
        port: u16,
        elapsed: Duration,
    },
    /// The optional round budget ran out before convergence.
    #[error("gave up waiting for {waiting_for} after {rounds} rounds")]
    RoundsExhausted { waiting_for: String, rounds: u32 },
    /// A probe error surfaced under the strict policy.
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What to do when a probe fails to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorPolicy {
    /// Treat the failure as "not ready yet" and retry next round (default).
    /// A node that refuses connections is simply a node that is not up yet.
    Lenient,
    /// Surface the first probe error immediately.
    Strict,
}

/// Controls one polling loop.
///
/// `max_wait: None` means the loop retries forever — the quorum and
/// registration waits deliberately keep that default, while the port wait
/// enforces a budget. `max_rounds` is an opt-in safety valve that bounds the
/// otherwise unbounded loops; it does not change default semantics.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub max_rounds: Option<u32>,
    pub probe_errors: ProbeErrorPolicy,
}

impl PollPolicy {
    /// Retry forever at the given interval.
    pub fn unbounded(interval: Duration) -> Self {
        PollPolicy {
            interval,
            max_wait: None,
            max_rounds: None,
            probe_errors: ProbeErrorPolicy::Lenient,
        }
    }

    /// Retry at the given interval until `max_wait` wall-clock time elapses.
    pub fn bounded(interval: Duration, max_wait: Duration) -> Self {
        PollPolicy {
            interval,
            max_wait: Some(max_wait),
            max_rounds: None,
            probe_errors: ProbeErrorPolicy::Lenient,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_probe_errors(mut self, policy: ProbeErrorPolicy) -> Self {
        self.probe_errors = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// The poller's only source of time. Production uses [`SystemClock`]; tests
/// inject a manual clock that advances on `sleep` and records the calls.
pub trait PollClock {
    /// Reset the elapsed measurement to zero. Called once per `run`.
    fn restart(&mut self);
    /// Wall-clock time since the last `restart`.
    fn elapsed(&self) -> Duration;
    /// Suspend for the polling interval.
    fn sleep(&mut self, interval: Duration);
}

/// Real time: `Instant` for elapsed, `thread::sleep` between rounds.
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PollClock for SystemClock {
    fn restart(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn sleep(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Outcome of one polling round (or of the loop as a whole).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// At least one target is not ready yet.
    Pending,
    /// Every target passed the readiness predicate this round.
    Converged,
    /// The wall-clock budget ran out.
    TimedOut,
}

/// Success report: how many rounds and how long convergence took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub rounds: u32,
    pub elapsed: Duration,
}

/// Polls a set of targets until a readiness predicate holds for all of them.
///
/// All state is transient — a poller is built for one wait and dropped.
pub struct ConvergencePoller {
    what: String,
    policy: PollPolicy,
    clock: Box<dyn PollClock>,
}

impl ConvergencePoller {
    /// `what` names the condition being waited on, for logs and errors.
    pub fn new(what: &str, policy: PollPolicy) -> Self {
        Self::with_clock(what, policy, Box::new(SystemClock::new()))
    }

    pub fn with_clock(what: &str, policy: PollPolicy, clock: Box<dyn PollClock>) -> Self {
        ConvergencePoller {
            what: what.to_string(),
            policy,
            clock,
        }
    }

    /// Run the loop to completion.
    ///
    /// `probe` is invoked once per target per round and returns the raw
    /// status text; `is_ready` judges that text. The first round in which
    /// every target is ready returns immediately — there is no settling
    /// period beyond one all-pass round.
    pub fn run<P, R>(
        &mut self,
        targets: &[String],
        mut probe: P,
        is_ready: R,
    ) -> Result<Convergence, WaitError>
    where
        P: FnMut(&str) -> Result<String, ProbeError>,
        R: Fn(&str) -> bool,
    {
        self.clock.restart();
        let mut rounds: u32 = 0;
        loop {
            rounds += 1;
            if let PollResult::Converged = self.poll_round(targets, &mut probe, &is_ready)? {
                let elapsed = self.clock.elapsed();
                info!(what = %self.what, rounds, ?elapsed, "converged");
                return Ok(Convergence { rounds, elapsed });
            }

            if let Some(max_rounds) = self.policy.max_rounds {
                if rounds >= max_rounds {
                    return Err(WaitError::RoundsExhausted {
                        waiting_for: self.what.clone(),
                        rounds,
                    });
                }
            }

            debug!(what = %self.what, rounds, "not converged yet; sleeping {:?}", self.policy.interval);
            self.clock.sleep(self.policy.interval);

            if let Some(max_wait) = self.policy.max_wait {
                let elapsed = self.clock.elapsed();
                if elapsed >= max_wait {
                    return Err(WaitError::TimedOut {
                        waiting_for: self.what.clone(),
                        elapsed,
                    });
                }
            }
        }
    }

    /// Probe every target once. Stops at the first target that is not ready
    /// — the remaining targets will be probed again next round anyway.
    pub fn poll_round<P, R>(
        &self,
        targets: &[String],
        probe: &mut P,
        is_ready: &R,
    ) -> Result<PollResult, WaitError>
    where
        P: FnMut(&str) -> Result<String, ProbeError>,
        R: Fn(&str) -> bool,
    {
        for target in targets {
            let output = match probe(target) {
                Ok(output) => output,
                Err(e) => match self.policy.probe_errors {
                    ProbeErrorPolicy::Lenient => {
                        warn!(what = %self.what, target = %target, error = %e, "probe failed; treating as not ready");
                        return Ok(PollResult::Pending);
                    }
                    ProbeErrorPolicy::Strict => return Err(WaitError::Probe(e)),
                },
            };
            if !is_ready(&output) {
                debug!(what = %self.what, target = %target, "not ready");
                return Ok(PollResult::Pending);
            }
        }
        Ok(PollResult::Converged)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Manual clock: `sleep` advances elapsed time by exactly the interval
    /// and records the call. Shared with the test through an `Rc`.
    #[derive(Default)]
    struct ManualState {
        now: Duration,
        sleeps: Vec<Duration>,
    }

    #[derive(Clone, Default)]
    struct ManualClock {
        state: Rc<RefCell<ManualState>>,
    }

    impl ManualClock {
        fn sleeps(&self) -> Vec<Duration> {
            self.state.borrow().sleeps.clone()
        }
    }

    impl PollClock for ManualClock {
        fn restart(&mut self) {
            self.state.borrow_mut().now = Duration::ZERO;
        }

        fn elapsed(&self) -> Duration {
            self.state.borrow().now
        }

        fn sleep(&mut self, interval: Duration) {
            let mut state = self.state.borrow_mut();
            state.now += interval;
            state.sleeps.push(interval);
        }
    }

    fn poller(policy: PollPolicy) -> (ConvergencePoller, ManualClock) {
        let clock = ManualClock::default();
        let poller = ConvergencePoller::with_clock("test condition", policy, Box::new(clock.clone()));
        (poller, clock)
    }

    /// Probe that replays scripted per-round outputs for a set of targets.
    fn scripted<'a>(
        rounds: Vec<Vec<&'static str>>,
        targets: &'a [String],
    ) -> impl FnMut(&str) -> Result<String, ProbeError> + 'a {
        let mut flat: Vec<(String, String)> = Vec::new();
        for round in rounds {
            for (target, output) in targets.iter().zip(round) {
                flat.push((target.clone(), output.to_string()));
            }
        }
        flat.reverse();
        move |target: &str| {
            let (expected, output) = flat.pop().expect("probe called more times than scripted");
            assert_eq!(expected, target, "probes must visit targets in order");
            Ok(output)
        }
    }

    fn settled(output: &str) -> bool {
        output.contains("Mode: follower") || output.contains("Mode: leader")
    }

    // -- Convergence --

    #[test]
    fn all_ready_converges_in_one_round_with_no_sleep() {
        let targets: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let (mut poller, clock) = poller(PollPolicy::unbounded(Duration::from_secs(3)));
        let result = poller
            .run(&targets, |_| Ok("Mode: leader".into()), settled)
            .unwrap();
        assert_eq!(result.rounds, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn ready_at_round_k_sleeps_k_minus_one_times() {
        let targets: Vec<String> = vec!["a".into()];
        let (mut poller, clock) = poller(PollPolicy::unbounded(Duration::from_secs(3)));
        let mut round = 0;
        let result = poller
            .run(
                &targets,
                |_| {
                    round += 1;
                    Ok(if round >= 4 { "Mode: leader" } else { "pending" }.into())
                },
                settled,
            )
            .unwrap();
        assert_eq!(result.rounds, 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 3]);
    }

    #[test]
    fn three_targets_settle_on_second_round() {
        // Round 1: leader/pending/pending. Round 2: all settled.
        let targets: Vec<String> = vec!["vm110".into(), "vm111".into(), "vm112".into()];
        // Round 1 short-circuits after vm111 reports a pre-election state.
        let mut outputs = vec![
            ("vm110", "Mode: leader"),
            ("vm111", "Mode: pending"),
            ("vm110", "Mode: leader"),
            ("vm111", "Mode: follower"),
            ("vm112", "Mode: follower"),
        ];
        outputs.reverse();
        let (mut poller, clock) = poller(PollPolicy::unbounded(Duration::from_secs(3)));
        let result = poller
            .run(
                &targets,
                |target| {
                    let (expected, output) = outputs.pop().unwrap();
                    assert_eq!(expected, target);
                    Ok(output.to_string())
                },
                settled,
            )
            .unwrap();
        assert_eq!(result.rounds, 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
    }

    #[test]
    fn registration_count_converges_when_children_match() {
        let targets: Vec<String> = vec!["vm110".into()];
        let (mut poller, _clock) = poller(PollPolicy::unbounded(Duration::from_secs(3)));
        let rounds = vec![vec!["numChildren = 3"], vec!["numChildren = 4"]];
        let result = poller
            .run(&targets, scripted(rounds, &targets), |out| {
                crate::convergence::status::parse_num_children(out) == Some(4)
            })
            .unwrap();
        assert_eq!(result.rounds, 2);
    }

    // -- Timeout --

    #[test]
    fn times_out_at_or_after_max_wait_never_earlier() {
        let targets: Vec<String> = vec!["a".into()];
        let (mut poller, clock) = poller(PollPolicy::bounded(
            Duration::from_secs(5),
            Duration::from_secs(10),
        ));
        let mut probes = 0;
        let err = poller
            .run(
                &targets,
                |_| {
                    probes += 1;
                    Ok("no".into())
                },
                |out| out.contains("yes"),
            )
            .unwrap_err();
        // Probes at t=0 and t=5; the budget is detected once elapsed reaches 10.
        assert_eq!(probes, 2);
        assert_eq!(clock.sleeps().len(), 2);
        match err {
            WaitError::TimedOut { elapsed, .. } => assert!(elapsed >= Duration::from_secs(10)),
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[test]
    fn budget_elapsing_during_sleep_stops_before_next_round() {
        // Would converge on round 2, but the budget runs out during the
        // first sleep and the poller never probes again.
        let targets: Vec<String> = vec!["a".into()];
        let (mut poller, _clock) = poller(PollPolicy::bounded(
            Duration::from_secs(5),
            Duration::from_secs(5),
        ));
        let mut probes = 0;
        let result = poller.run(
            &targets,
            |_| {
                probes += 1;
                Ok(if probes >= 2 { "yes" } else { "no" }.into())
            },
            |out| out.contains("yes"),
        );
        assert!(matches!(result, Err(WaitError::TimedOut { .. })));
        assert_eq!(probes, 1);
    }

    #[test]
    fn unbounded_loop_is_cut_off_only_by_round_budget() {
        let targets: Vec<String> = vec!["a".into()];
        let policy = PollPolicy::unbounded(Duration::from_secs(3)).with_max_rounds(Some(50));
        let (mut poller, clock) = poller(policy);
        let err = poller
            .run(&targets, |_| Ok("never".into()), |out| out.contains("yes"))
            .unwrap_err();
        assert!(matches!(err, WaitError::RoundsExhausted { rounds: 50, .. }));
        assert_eq!(clock.sleeps().len(), 49);
    }

    // -- Probe errors --

    #[test]
    fn lenient_policy_retries_after_probe_error() {
        let targets: Vec<String> = vec!["a".into()];
        let (mut poller, _clock) = poller(PollPolicy::unbounded(Duration::from_secs(1)));
        let mut round = 0;
        let result = poller
            .run(
                &targets,
                |target| {
                    round += 1;
                    if round == 1 {
                        Err(ProbeError::new(target, "connection refused"))
                    } else {
                        Ok("yes".into())
                    }
                },
                |out| out.contains("yes"),
            )
            .unwrap();
        assert_eq!(result.rounds, 2);
    }

    #[test]
    fn strict_policy_surfaces_probe_error() {
        let targets: Vec<String> = vec!["a".into()];
        let policy = PollPolicy::unbounded(Duration::from_secs(1))
            .with_probe_errors(ProbeErrorPolicy::Strict);
        let (mut poller, _clock) = poller(policy);
        let err = poller
            .run(
                &targets,
                |target| Err(ProbeError::new(target, "connection refused")),
                |_| true,
            )
            .unwrap_err();
        assert!(matches!(err, WaitError::Probe(_)));
    }
}
