use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::Duration;

/// Why an attempt failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure: connection refused, timeout, DNS or TLS
    /// error. The request never completed, so there is no latency sample.
    Network,
    /// The server answered with a non-success status. The request completed,
    /// so the measured latency is kept alongside the failure.
    HttpStatus(u16),
    /// The attempt was abandoned during a cancellation drain.
    Cancelled,
}

/// The result of one attempt. Latency is measured end-to-end, from request
/// issuance to completion or terminal failure.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequestOutcome {
    Success {
        #[serde_as(as = "DurationSecondsWithFrac")]
        latency: Duration,
        status: u16,
    },
    Failure {
        #[serde_as(as = "Option<DurationSecondsWithFrac>")]
        latency: Option<Duration>,
        kind: ErrorKind,
    },
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            RequestOutcome::Success { latency, .. } => Some(*latency),
            RequestOutcome::Failure { latency, .. } => *latency,
        }
    }

    /// Failure with no latency sample, used for attempts that never ran to
    /// completion.
    pub fn abandoned() -> Self {
        RequestOutcome::Failure {
            latency: None,
            kind: ErrorKind::Cancelled,
        }
    }
}
