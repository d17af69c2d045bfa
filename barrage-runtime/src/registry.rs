use barrage::{http_runner, Aggregator, CancelHandle};
use barrage_core::{ConfigError, LoadTestConfig, RunResult, RunState};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use uuid::Uuid;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Live and finished runs, keyed by id.
///
/// Each entry keeps the run's state watch, its aggregator (for in-progress
/// snapshots) and its cancel handle; the run itself executes on a spawned
/// task. Entries are retained after the run finishes so callers can fetch
/// the final result.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
}

struct RunEntry {
    state: watch::Receiver<RunState>,
    aggregator: Aggregator,
    cancel: CancelHandle,
}

/// Point-in-time view of a registered run. The snapshot is provisional
/// until `state` is terminal.
pub struct RunStatus {
    pub id: Uuid,
    pub state: RunState,
    pub snapshot: RunResult,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and start a run in the background. The config is the only
    /// thing that can fail here; everything after this point surfaces
    /// through the run's own result.
    pub fn start(&self, config: LoadTestConfig) -> Result<Uuid, ConfigError> {
        let runner = http_runner(config)?;
        let id = Uuid::new_v4();
        let entry = RunEntry {
            state: runner.state(),
            aggregator: runner.aggregator(),
            cancel: runner.cancel_handle(),
        };
        self.write().insert(id, entry);
        tokio::spawn(async move {
            runner.run().await;
        });
        info!(%id, "run registered");
        Ok(id)
    }

    pub fn status(&self, id: &Uuid) -> Option<RunStatus> {
        let runs = self.read();
        let entry = runs.get(id)?;
        // Copy the state out before the struct expression so the watch
        // borrow does not outlive the map guard.
        let state = *entry.state.borrow();
        Some(RunStatus {
            id: *id,
            state,
            snapshot: entry.aggregator.snapshot(),
        })
    }

    /// Signal cancellation. Returns false for an unknown id. Cancelling a
    /// run that already reached a terminal state is a no-op.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.read().get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(%id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, RunEntry>> {
        self.runs.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, RunEntry>> {
        self.runs.write().unwrap_or_else(|err| err.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barrage_core::StopCondition;
    use std::time::Duration;

    fn config() -> LoadTestConfig {
        // Nothing listens on port 1, so every attempt is a fast network
        // failure; the registry mechanics are what is under test.
        LoadTestConfig::new("http://127.0.0.1:1/", 50., StopCondition::Requests(5))
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn start_status_and_finish() {
        let registry = RunRegistry::new();
        let id = registry.start(config()).unwrap();

        let mut status = registry.status(&id).unwrap();
        while !status.state.is_terminal() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = registry.status(&id).unwrap();
        }

        assert_eq!(status.state, RunState::Completed);
        assert_eq!(status.snapshot.total_attempted, 5);
        assert_eq!(status.snapshot.error_rate(), 1.0);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let registry = RunRegistry::new();
        assert!(registry.status(&Uuid::new_v4()).is_none());
        assert!(!registry.cancel(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_registering() {
        let registry = RunRegistry::new();
        let mut config = config();
        config.rate = 0.;
        assert!(registry.start(config).is_err());
        assert!(registry.read().is_empty());
    }

    #[tokio::test]
    async fn cancel_reaches_a_terminal_state() {
        let registry = RunRegistry::new();
        let mut config = config();
        config.stop = StopCondition::Duration(Duration::from_secs(30));
        let id = registry.start(config).unwrap();

        assert!(registry.cancel(&id));
        let mut status = registry.status(&id).unwrap();
        while !status.state.is_terminal() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = registry.status(&id).unwrap();
        }
        assert_eq!(status.state, RunState::Cancelled);
    }
}
