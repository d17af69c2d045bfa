#![cfg_attr(docsrs, feature(doc_cfg))]
//! Barrage is a rate-controlled HTTP load generator.
//!
//! Given a target URL and a request rate, it issues requests at that rate
//! for a measurement interval, bounds in-flight concurrency with a
//! semaphore, records per-request latency and outcome, and reports the
//! aggregate latency distribution and error rate.
//!
//! ```no_run
//! use barrage::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = load_test("http://localhost:3000/api")
//!         .rate(50.)
//!         .duration(Duration::from_secs(30))
//!         .max_concurrency(20)
//!         .await
//!         .unwrap();
//!
//!     println!("{}", result.summary());
//! }
//! ```
//!
//! For explicit control over cancellation, state observation and in-progress
//! snapshots, use [`Runner`] directly with any transaction closure (the HTTP
//! transport is just the default one; see [`HttpExecutor`]).

pub mod aggregator;
pub mod executor;
pub mod limiter;
pub mod runner;
pub mod ticker;

pub use aggregator::Aggregator;
pub use executor::HttpExecutor;
pub use limiter::ConcurrencyLimiter;
pub use runner::{CancelHandle, Runner};
pub use ticker::Ticker;

pub use barrage_core::{
    ConfigError, ErrorKind, LoadTestConfig, RequestOutcome, RunResult, RunState, RunSummary,
    SaturationPolicy, StopCondition, DEFAULT_REQUEST_TIMEOUT,
};

pub mod prelude {
    pub use crate::executor::HttpExecutor;
    pub use crate::runner::{CancelHandle, Runner};
    pub use crate::{load_test, LoadTest};
    pub use barrage_core::{
        ConfigError, ErrorKind, LoadTestConfig, RequestOutcome, RunResult, RunState, RunSummary,
        SaturationPolicy, StopCondition,
    };
}

use barrage_core::default_concurrency;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

/// One dispatched HTTP attempt.
pub type HttpAttempt = Pin<Box<dyn Future<Output = RequestOutcome> + Send>>;

/// A [`Runner`] whose transaction is the reqwest-backed [`HttpExecutor`]
/// aimed at `config.target`.
pub fn http_runner(
    config: LoadTestConfig,
) -> Result<Runner<impl Fn() -> HttpAttempt + Send>, ConfigError> {
    let executor = HttpExecutor::new(&config.target)?.request_timeout(config.request_timeout);
    Runner::new(config, move || {
        let executor = executor.clone();
        Box::pin(async move { executor.execute().await }) as HttpAttempt
    })
}

/// Start building a load test against `target`.
pub fn load_test(target: &str) -> LoadTest {
    LoadTest {
        target: target.to_string(),
        rate: 1.,
        stop: None,
        max_concurrency: None,
        on_saturation: SaturationPolicy::default(),
        drain_deadline: None,
        request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        runner_fut: None,
    }
}

/// A configured load test. Awaiting it runs it to completion.
///
/// One of [`duration`](LoadTest::duration) or [`requests`](LoadTest::requests)
/// must be set; everything else has defaults (rate 1, concurrency bound equal
/// to the rate rounded up, block-and-queue saturation policy).
#[pin_project::pin_project]
pub struct LoadTest {
    target: String,
    rate: f64,
    stop: Option<StopCondition>,
    max_concurrency: Option<usize>,
    on_saturation: SaturationPolicy,
    drain_deadline: Option<Duration>,
    request_timeout: Option<Duration>,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<RunResult, ConfigError>> + Send>>>,
}

impl LoadTest {
    /// Target request rate in requests per second. Fractional rates are
    /// valid.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Stop dispatching after this much wall time.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.stop = Some(StopCondition::Duration(duration));
        self
    }

    /// Stop dispatching after this many attempts.
    pub fn requests(mut self, count: u64) -> Self {
        self.stop = Some(StopCondition::Requests(count));
        self
    }

    /// Upper bound on in-flight requests.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Discard ticks that fire while saturated instead of queueing them.
    pub fn drop_on_saturation(mut self) -> Self {
        self.on_saturation = SaturationPolicy::Drop;
        self
    }

    /// Hard deadline for the cancellation drain.
    pub fn drain_deadline(mut self, deadline: Duration) -> Self {
        self.drain_deadline = Some(deadline);
        self
    }

    /// Per-request timeout (default 30s). A request still outstanding at
    /// the deadline is recorded as a transport failure.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn build_config(&self) -> Result<LoadTestConfig, ConfigError> {
        let stop = self.stop.ok_or(ConfigError::MissingStopCondition)?;
        let config = LoadTestConfig {
            target: self.target.clone(),
            rate: self.rate,
            stop,
            max_concurrency: self
                .max_concurrency
                .unwrap_or_else(|| default_concurrency(self.rate)),
            on_saturation: self.on_saturation,
            drain_deadline: self.drain_deadline,
            request_timeout: self.request_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Future for LoadTest {
    type Output = Result<RunResult, ConfigError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let config = self.build_config();
            self.runner_fut = Some(Box::pin(async move {
                let runner = http_runner(config?)?;
                Ok(runner.run().await)
            }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}
