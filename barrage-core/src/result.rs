use pdatastructs::tdigest::{TDigest, K1};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::Duration;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Accumulated outcome of a run.
///
/// Append-only while the run is live; the value handed back at finalization
/// is immutable. `latencies` holds successful attempts in completion order
/// (issuance order is not preserved). Invariant:
/// `error_count + latencies.len() == total_attempted`.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde_as(as = "Vec<DurationSecondsWithFrac>")]
    pub latencies: Vec<Duration>,
    pub error_count: u64,
    pub total_attempted: u64,
}

impl RunResult {
    pub fn error_rate(&self) -> f64 {
        if self.total_attempted == 0 {
            0.
        } else {
            self.error_count as f64 / self.total_attempted as f64
        }
    }

    pub fn summary(&self) -> RunSummary {
        let secs: Vec<f64> = self.latencies.iter().map(Duration::as_secs_f64).collect();

        let (mean, p50, p90, p99) = if secs.is_empty() {
            (None, None, None, None)
        } else {
            let mut digest = default_tdigest();
            for s in &secs {
                digest.insert(*s);
            }
            let quantile = |q: f64| Some(Duration::from_secs_f64(digest.quantile(q)));
            (
                Some(Duration::from_secs_f64(statistical::mean(&secs))),
                quantile(0.5),
                quantile(0.9),
                quantile(0.99),
            )
        };

        RunSummary {
            total_attempted: self.total_attempted,
            error_count: self.error_count,
            error_rate: self.error_rate(),
            mean_latency: mean,
            latency_p50: p50,
            latency_p90: p90,
            latency_p99: p99,
        }
    }
}

/// Distribution-level view of a [`RunResult`].
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_attempted: u64,
    pub error_count: u64,
    pub error_rate: f64,
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub mean_latency: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub latency_p50: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub latency_p90: Option<Duration>,
    #[serde_as(as = "Option<DurationSecondsWithFrac>")]
    pub latency_p99: Option<Duration>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "attempts:   {}", self.total_attempted)?;
        writeln!(f, "errors:     {}", self.error_count)?;
        writeln!(f, "error rate: {:.2}%", self.error_rate * 100.)?;
        let fmt_latency = |latency: Option<Duration>| match latency {
            // Truncate to micros; nanosecond noise is meaningless here.
            Some(l) => humantime::format_duration(Duration::from_micros(l.as_micros() as u64))
                .to_string(),
            None => "-".to_string(),
        };
        writeln!(f, "latency mean: {}", fmt_latency(self.mean_latency))?;
        writeln!(f, "latency p50:  {}", fmt_latency(self.latency_p50))?;
        writeln!(f, "latency p90:  {}", fmt_latency(self.latency_p90))?;
        write!(f, "latency p99:  {}", fmt_latency(self.latency_p99))
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
