//! Failure gate for the remote kline provider.
//!
//! The kline endpoint fails in two distinct ways: an outright ban (the
//! provider blocks the client IP) and transient misses (rate limits,
//! timeouts, flaky gateways). A ban opens the gate immediately; transient
//! misses only open it after a consecutive run. Once the cooldown
//! elapses the gate lets a single probe request through; a failed probe
//! re-opens it for a full cooldown and a successful one closes it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How a provider request went, from the gate's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    Ok,
    /// Rate limit, timeout, or an unexpected status; worth retrying.
    Transient,
    /// The provider blocked the client outright.
    Banned,
}

#[derive(Debug, Clone, Copy)]
enum GateState {
    /// Requests flow; counts the current run of transient misses.
    Closed { misses: u32 },
    /// Refusing requests until the cooldown elapses.
    Open { since: Instant },
    /// Cooldown elapsed; exactly one probe request is out.
    HalfOpen,
}

pub struct CircuitBreaker {
    state: Mutex<GateState>,
    cooldown: Duration,
    /// Consecutive transient misses that open the gate.
    trip_after: u32,
}

impl CircuitBreaker {
    pub fn new(trip_after: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::Closed { misses: 0 }),
            cooldown,
            trip_after,
        }
    }

    /// Defaults tuned for the kline endpoint: three consecutive misses
    /// open the gate for half an hour.
    pub fn default_provider() -> Self {
        Self::new(3, Duration::from_secs(30 * 60))
    }

    /// Whether the next request may go out.
    ///
    /// The first call after the cooldown elapses claims the half-open
    /// probe slot; callers must `record` the probe's outcome before
    /// another request is allowed.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            GateState::Closed { .. } => true,
            GateState::HalfOpen => false,
            GateState::Open { since } => {
                if since.elapsed() >= self.cooldown {
                    *state = GateState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Read-only view for status reporting: whether a request would
    /// currently go out. Unlike `is_allowed`, never claims the half-open
    /// probe slot.
    pub fn can_attempt(&self) -> bool {
        match *self.state.lock().unwrap() {
            GateState::Closed { .. } => true,
            GateState::HalfOpen => false,
            GateState::Open { since } => since.elapsed() >= self.cooldown,
        }
    }

    /// Report how a request went.
    pub fn record(&self, outcome: ProviderOutcome) {
        let mut state = self.state.lock().unwrap();
        *state = match (*state, outcome) {
            // A ban opens the gate no matter where it was.
            (_, ProviderOutcome::Banned) => GateState::Open {
                since: Instant::now(),
            },
            (GateState::HalfOpen, ProviderOutcome::Ok) => GateState::Closed { misses: 0 },
            (GateState::HalfOpen, ProviderOutcome::Transient) => GateState::Open {
                since: Instant::now(),
            },
            (GateState::Closed { .. }, ProviderOutcome::Ok) => GateState::Closed { misses: 0 },
            (GateState::Closed { misses }, ProviderOutcome::Transient) => {
                if misses + 1 >= self.trip_after {
                    GateState::Open {
                        since: Instant::now(),
                    }
                } else {
                    GateState::Closed { misses: misses + 1 }
                }
            }
            // Stale report from a request that raced the trip.
            (open @ GateState::Open { .. }, _) => open,
        };
    }

    /// Time left before the gate will offer a probe (zero when it is not
    /// open). Surfaced to users so a tripped download run can say when
    /// retrying is worthwhile.
    pub fn remaining_cooldown(&self) -> Duration {
        match *self.state.lock().unwrap() {
            GateState::Open { since } => self.cooldown.saturating_sub(since.elapsed()),
            _ => Duration::ZERO,
        }
    }
}
