use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout applied when the caller does not set one. Without a
/// timeout, a target that accepts a connection and never responds would hold
/// its attempt (and the run's drain) open forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Invalid run parameters. Rejected before any request is issued; fatal to
/// the start call only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("rate must be a positive, finite number of requests per second (got {0})")]
    InvalidRate(f64),

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("target must not be empty")]
    EmptyTarget,

    #[error("target is not a valid URL: {0}")]
    InvalidTarget(String),

    #[error("request count must be at least 1")]
    ZeroRequests,

    #[error("duration must be non-zero")]
    ZeroDuration,

    #[error("duration must be a positive, finite number of seconds (got {0})")]
    InvalidDuration(f64),

    #[error("exactly one of duration or request count must be set")]
    MissingStopCondition,

    #[error("duration and request count are mutually exclusive")]
    ConflictingStopCondition,

    #[error("request timeout must be non-zero")]
    ZeroTimeout,
}

/// Terminal condition for a run. The enum guarantees exactly one is set.
#[serde_as]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StopCondition {
    /// Stop dispatching once this much wall time has elapsed.
    Duration(#[serde_as(as = "DurationSecondsWithFrac")] Duration),
    /// Stop dispatching once this many attempts have been issued.
    Requests(u64),
}

/// What to do with a tick that fires while all concurrency slots are taken.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Wait for a slot. Every tick eventually becomes an attempt; effective
    /// throughput self-throttles below the target rate under saturation.
    #[default]
    Queue,
    /// Discard the tick without issuing an attempt. Pacing of the remaining
    /// ticks is preserved, at the cost of a lower effective rate.
    Drop,
}

/// Parameters for a single load test run. Immutable once the run starts.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub target: String,
    /// Requests per second. Fractional rates are valid (e.g. 0.5 is one
    /// request every two seconds).
    pub rate: f64,
    pub stop: StopCondition,
    /// Upper bound on in-flight requests.
    pub max_concurrency: usize,
    pub on_saturation: SaturationPolicy,
    /// Hard deadline for the cancellation drain. In-flight requests still
    /// running at the deadline are abandoned and recorded as `Cancelled`
    /// failures. `None` drains without a deadline.
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub drain_deadline: Option<Duration>,
    /// Per-request timeout. A request still outstanding at the timeout is a
    /// transport failure. `None` disables the timeout entirely, which leaves
    /// the run exposed to targets that never respond.
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub request_timeout: Option<Duration>,
}

impl LoadTestConfig {
    /// Config with the default concurrency bound (rate rounded up) and the
    /// default block-and-queue saturation policy.
    pub fn new(target: impl Into<String>, rate: f64, stop: StopCondition) -> Self {
        Self {
            target: target.into(),
            rate,
            stop,
            max_concurrency: default_concurrency(rate),
            on_saturation: SaturationPolicy::default(),
            drain_deadline: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if !(self.rate.is_finite() && self.rate > 0.) {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if matches!(self.request_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        match self.stop {
            StopCondition::Duration(dur) if dur.is_zero() => Err(ConfigError::ZeroDuration),
            StopCondition::Requests(0) => Err(ConfigError::ZeroRequests),
            _ => Ok(()),
        }
    }
}

/// Default in-flight cap when the caller does not provide one: the target
/// rate rounded up, never below 1.
pub fn default_concurrency(rate: f64) -> usize {
    if rate.is_finite() && rate > 1. {
        rate.ceil() as usize
    } else {
        1
    }
}
