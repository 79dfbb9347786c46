//! Concurrency gate bounding simultaneous in-flight requests.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ArchiveError, Result};

/// Counting gate shared by every operation of a client.
///
/// A slot is held by a [`GatePermit`] and returned when the permit drops,
/// whatever the outcome of the request (success, error, cancellation or
/// panic). A cancelled wait never takes a slot.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held gate slot
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `capacity` holders at once
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ArchiveError::Configuration(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<GatePermit> {
        if self.semaphore.available_permits() == 0 {
            tracing::debug!(capacity = self.capacity, "Waiting for a concurrency slot");
        }
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ArchiveError::Lifecycle("concurrency gate closed".to_string()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    /// Maximum simultaneous holders
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(ConcurrencyGate::new(0).is_err());
    }

    #[tokio::test]
    async fn test_permits_are_released_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        assert_eq!(gate.in_flight(), 2);
        assert!(gate.try_acquire().is_none());

        drop(a);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_waiter_resumes_when_slot_frees() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_wait_takes_no_slot() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(timed_out.is_err());
        assert_eq!(gate.available(), 0);

        drop(held);
        assert_eq!(gate.available(), 1);
    }
}
