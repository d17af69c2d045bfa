use crate::aggregator::Aggregator;
use crate::limiter::ConcurrencyLimiter;
use crate::ticker::Ticker;
use barrage_core::{
    ConfigError, LoadTestConfig, RequestOutcome, RunResult, RunState, SaturationPolicy,
    StopCondition,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout, Instant};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Cooperative cancellation signal for a running load test.
///
/// Cancelling stops new dispatch immediately and triggers the drain phase;
/// in-flight requests are allowed to finish naturally unless the config sets
/// a drain deadline. Safe to call from any task, any number of times.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

enum Ended {
    Completed,
    Cancelled,
}

/// Drives one load test run: `Pending → Running → {Completed, Cancelled}`.
///
/// Each ticker event acquires a concurrency slot (blocking under the default
/// [`SaturationPolicy::Queue`], non-blocking under
/// [`SaturationPolicy::Drop`]) and dispatches one invocation of the
/// transaction as an independent task. The task records its outcome into the
/// aggregator and releases the slot. The runner owns the stop condition, the
/// drain phase, and the single finalizing snapshot.
pub struct Runner<T> {
    config: LoadTestConfig,
    transaction: T,
    aggregator: Aggregator,
    state_tx: watch::Sender<RunState>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<T, F> Runner<T>
where
    T: Fn() -> F + Send + 'static,
    F: Future<Output = RequestOutcome> + Send + 'static,
{
    /// Validates the config; an invalid config is rejected here, before any
    /// request is issued, and the run never leaves `Pending`.
    pub fn new(config: LoadTestConfig, transaction: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state_tx, _) = watch::channel(RunState::Pending);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Ok(Self {
            config,
            transaction,
            aggregator: Aggregator::new(),
            state_tx,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Observe lifecycle transitions (used by the control API to stream run
    /// status).
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Handle for in-progress snapshots. Snapshots taken before the state is
    /// terminal are provisional.
    pub fn aggregator(&self) -> Aggregator {
        self.aggregator.clone()
    }

    #[instrument(name = "run", skip_all, fields(target = %self.config.target, rate = self.config.rate))]
    pub async fn run(self) -> RunResult {
        let Self {
            config,
            transaction,
            aggregator,
            state_tx,
            cancel_tx,
            mut cancel_rx,
        } = self;
        // Keep at least one cancel sender alive for the whole run so the
        // watch channel cannot close under us.
        let _cancel_tx = cancel_tx;

        state_tx.send_replace(RunState::Running);
        info!(
            max_concurrency = config.max_concurrency,
            stop = ?config.stop,
            policy = ?config.on_saturation,
            "run started"
        );

        let mut ticker = Ticker::with_period(Duration::from_secs_f64(1. / config.rate));
        let limiter = ConcurrencyLimiter::new(config.max_concurrency);
        let mut in_flight = JoinSet::new();
        let deadline = match config.stop {
            StopCondition::Duration(dur) => Some(Instant::now() + dur),
            StopCondition::Requests(_) => None,
        };

        let mut dispatched: u64 = 0;
        let mut skipped: u64 = 0;

        let ended = loop {
            if let StopCondition::Requests(count) = config.stop {
                if dispatched >= count {
                    break Ended::Completed;
                }
            }

            tokio::select! {
                biased;
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => break Ended::Cancelled,
                _ = wait_deadline(deadline) => break Ended::Completed,
                _ = ticker.tick() => {}
            }

            let permit = match config.on_saturation {
                SaturationPolicy::Queue => tokio::select! {
                    biased;
                    _ = cancel_rx.wait_for(|cancelled| *cancelled) => break Ended::Cancelled,
                    _ = wait_deadline(deadline) => break Ended::Completed,
                    permit = limiter.acquire() => permit,
                },
                SaturationPolicy::Drop => match limiter.try_acquire() {
                    Some(permit) => permit,
                    None => {
                        skipped += 1;
                        trace!("saturated; dropping tick");
                        continue;
                    }
                },
            };

            dispatched += 1;
            let attempt = transaction();
            let aggregator = aggregator.clone();
            in_flight.spawn(async move {
                let outcome = attempt.await;
                // Record before the permit drops so a freed slot always
                // implies a recorded outcome.
                aggregator.record(outcome);
                drop(permit);
            });
        };

        debug!(
            dispatched,
            skipped,
            remaining = in_flight.len(),
            "dispatch stopped; draining in-flight requests"
        );

        let drain_deadline = match ended {
            // The hard deadline only applies to a cancellation drain; a
            // completed run always waits out its tail.
            Ended::Cancelled => config.drain_deadline,
            Ended::Completed => None,
        };
        drain(&mut in_flight, drain_deadline).await;

        // Attempts abandoned at the drain deadline never recorded themselves.
        let recorded = aggregator.total_attempted();
        for _ in recorded..dispatched {
            aggregator.record(RequestOutcome::abandoned());
        }

        let result = aggregator.snapshot();
        let state = match ended {
            Ended::Completed => RunState::Completed,
            Ended::Cancelled => RunState::Cancelled,
        };
        state_tx.send_replace(state);
        info!(
            total_attempted = result.total_attempted,
            errors = result.error_count,
            error_rate = result.error_rate(),
            %state,
            "run finished"
        );
        result
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn drain(in_flight: &mut JoinSet<()>, deadline: Option<Duration>) {
    let all = async {
        while let Some(res) = in_flight.join_next().await {
            if let Err(err) = res {
                if !err.is_cancelled() {
                    error!("execution task panicked: {err}");
                }
            }
        }
    };

    match deadline {
        None => all.await,
        Some(limit) => {
            if timeout(limit, all).await.is_err() {
                warn!(
                    abandoned = in_flight.len(),
                    "drain deadline reached; abandoning in-flight requests"
                );
                in_flight.abort_all();
                while in_flight.join_next().await.is_some() {}
            }
        }
    }
}
