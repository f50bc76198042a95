//! In-process counters for single-instance deployments and tests.
//!
//! Expiry follows the tokio clock, so paused-time tests can step through
//! window boundaries. Expired counters are dropped by a sweep that runs every
//! [`SWEEP_EVERY`] writes, so the map never holds more dead keys than one
//! sweep interval plus what was live at the previous sweep.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CounterStore, StoreError};

/// Writes between sweeps of expired counters.
pub const SWEEP_EVERY: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

impl Counter {
    fn fresh(now: Instant, ttl: Duration) -> Self {
        Self {
            value: 1,
            expires_at: now + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
    writes: AtomicUsize,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.counters.iter().filter(|c| c.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired counter. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.is_live(now));
        before.saturating_sub(self.counters.len())
    }

    fn record_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(
                    purged,
                    remaining = self.counters.len(),
                    "Swept expired rate-limit counters"
                );
            }
        }
    }

    fn bump(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        let count = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut slot) if slot.get().is_live(now) => {
                let counter = slot.get_mut();
                counter.value += 1;
                counter.value
            }
            Entry::Occupied(mut slot) => {
                slot.insert(Counter::fresh(now, ttl));
                1
            }
            Entry::Vacant(slot) => {
                slot.insert(Counter::fresh(now, ttl));
                1
            }
        };
        self.record_write();
        count
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(key)
            .filter(|c| c.is_live(now))
            .map(|c| c.value))
    }

    async fn start_window(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.counters
            .insert(key.to_string(), Counter::fresh(Instant::now(), ttl));
        self.record_write();
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        Ok(self.bump(key, ttl))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
