use barrage_core::ConfigError;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Pacing events at a fixed target rate.
///
/// Fire times are spaced from the previous *scheduled* fire time, not the
/// actual one, so scheduling jitter never accumulates into rate drift. When
/// the coordinating task falls behind, the missed ticks fire immediately and
/// the following ticks re-synchronize to the original schedule
/// ([`MissedTickBehavior::Burst`]).
///
/// The first tick completes immediately. Stopping is dropping the ticker; a
/// tick is either fully delivered or not delivered at all.
pub struct Ticker {
    interval: Interval,
    period: Duration,
}

impl Ticker {
    /// Build a ticker firing `rate` times per second. Fractional rates are
    /// valid; rates that are zero, negative or non-finite are a
    /// [`ConfigError`].
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        if !(rate.is_finite() && rate > 0.) {
            return Err(ConfigError::InvalidRate(rate));
        }
        Ok(Self::with_period(Duration::from_secs_f64(1. / rate)))
    }

    /// Build a ticker from an already-validated inter-request period.
    pub fn with_period(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval, period }
    }

    /// Suspend until the next scheduled fire time.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}
