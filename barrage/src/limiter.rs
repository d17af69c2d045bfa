use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of in-flight requests.
///
/// A capacity-N semaphore: at most N outstanding executions hold a permit at
/// any time. Permits are released by dropping them when the execution
/// completes. Capacity is fixed for the run.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Suspend until a slot is free. Only the calling task waits; nothing
    /// else is blocked.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition cannot fail.
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore closed")
    }

    /// Non-blocking acquire for the drop-on-saturation policy. `None` means
    /// every slot is taken.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
