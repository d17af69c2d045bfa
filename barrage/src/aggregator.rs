use barrage_core::{RequestOutcome, RunResult};
use std::sync::{Arc, Mutex};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Thread-safe accumulation of attempt outcomes.
///
/// This is the only mutable object shared across concurrent executions. Each
/// [`record`](Aggregator::record) applies in full or not at all: the latency
/// append (or error increment) and the `total_attempted` bump happen under
/// one lock, so a [`snapshot`](Aggregator::snapshot) is a consistent
/// point-in-time view and can never observe a half-applied record.
#[derive(Clone, Default)]
pub struct Aggregator {
    inner: Arc<Mutex<RunResult>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt. Safe to call concurrently from any number of
    /// executions; no outcome is lost or double-counted.
    pub fn record(&self, outcome: RequestOutcome) {
        #[cfg(feature = "metrics")]
        emit_metrics(&outcome);

        let mut inner = self.lock();
        inner.total_attempted += 1;
        match outcome {
            RequestOutcome::Success { latency, .. } => inner.latencies.push(latency),
            RequestOutcome::Failure { .. } => inner.error_count += 1,
        }
    }

    /// Consistent view of every record that completed before this call.
    pub fn snapshot(&self) -> RunResult {
        self.lock().clone()
    }

    pub fn total_attempted(&self) -> u64 {
        self.lock().total_attempted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunResult> {
        // A record holds the lock only for an append; a panic inside it is
        // impossible, so poisoning cannot leave partial state behind.
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

#[cfg(feature = "metrics")]
fn emit_metrics(outcome: &RequestOutcome) {
    if let Some(latency) = outcome.latency() {
        metrics::histogram!("barrage_latency").record(latency.as_secs_f64());
    }
    if outcome.is_success() {
        metrics::counter!("barrage_success").increment(1);
    } else {
        metrics::counter!("barrage_error").increment(1);
    }
}
