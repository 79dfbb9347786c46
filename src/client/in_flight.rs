//! Per-key claims that let identical concurrent requests share one upstream call.
//!
//! The first caller for a key holds the claim while it fetches and fills the
//! cache. Later callers for the same key wait for the claim, then find the
//! response in the cache. A claim is released on drop, so a failed or
//! cancelled leader simply hands the key to the next waiter.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::CacheKey;

type Slot = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl InFlight {
    /// Wait until no other caller holds `key`, then hold it
    pub(crate) async fn claim(&self, key: &CacheKey) -> Claim<'_> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;

        Claim {
            owner: self,
            key: key.clone(),
            slot,
            guard: Some(guard),
        }
    }

    /// Keys with a claim held or awaited
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// A held claim on one key
pub(crate) struct Claim<'a> {
    owner: &'a InFlight,
    key: CacheKey,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.guard.take();

        // the map and this claim are the only handles left: nobody is waiting
        let mut slots = self.owner.slots.lock();
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
