//! Storage contracts for interval history and the open-interval slot.
//!
//! The tracker never talks to a concrete backend. Hosts supply an implementation
//! of [`HistoryStore`] and [`OpenIntervalSlot`]; [`MemoryStore`] covers tests and
//! embedders that do not need durability, and `ct-db` provides SQLite.
//!
//! # Implementation Notes
//!
//! - All methods are async so backends can suspend on I/O
//! - `append` upserts by [`IntervalKey`](crate::IntervalKey) and must apply the
//!   whole batch or nothing
//! - `read_all` returns intervals ordered by `start` ascending

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;

use crate::interval::{Interval, IntervalKey};

/// A storage backend rejected a read or write.
#[derive(Debug, Error)]
#[error("{operation} failed: {source}")]
pub struct StoreError {
    operation: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl StoreError {
    pub fn new(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// The store operation that failed (e.g. "append").
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Durable, ordered history of closed intervals.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Upserts every interval by key as one atomic unit.
    async fn append(&self, intervals: &[Interval]) -> Result<(), StoreError>;

    /// Clears the entire history.
    async fn remove_all(&self) -> Result<(), StoreError>;

    /// Returns the history ordered by `start` ascending.
    async fn read_all(&self) -> Result<Vec<Interval>, StoreError>;

    /// Returns the most recent interval, if any.
    async fn last(&self) -> Result<Option<Interval>, StoreError> {
        Ok(self.read_all().await?.pop())
    }

    /// Atomically replaces the history with `intervals`.
    async fn replace_all(&self, intervals: &[Interval]) -> Result<(), StoreError>;
}

/// Durable single-value slot holding the open contraction.
#[async_trait]
pub trait OpenIntervalSlot: Send + Sync {
    async fn get(&self) -> Result<Option<Interval>, StoreError>;

    async fn set(&self, interval: &Interval) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    history: BTreeMap<IntervalKey, Interval>,
    open: Option<Interval>,
}

/// In-memory implementation of both storage traits.
///
/// History is keyed by [`IntervalKey`], so re-appending an interval with the same
/// start replaces it, matching the upsert semantics of the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `history` and an optional open interval.
    pub fn with_state(history: Vec<Interval>, open: Option<Interval>) -> Self {
        let history = history
            .into_iter()
            .map(|interval| (interval.key(), interval))
            .collect();
        Self {
            state: Mutex::new(MemoryState { history, open }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, intervals: &[Interval]) -> Result<(), StoreError> {
        let mut state = self.lock();
        for interval in intervals {
            state.history.insert(interval.key(), interval.clone());
        }
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        self.lock().history.clear();
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Interval>, StoreError> {
        Ok(self.lock().history.values().cloned().collect())
    }

    async fn last(&self) -> Result<Option<Interval>, StoreError> {
        Ok(self.lock().history.values().next_back().cloned())
    }

    async fn replace_all(&self, intervals: &[Interval]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.history = intervals
            .iter()
            .map(|interval| (interval.key(), interval.clone()))
            .collect();
        Ok(())
    }
}

#[async_trait]
impl OpenIntervalSlot for MemoryStore {
    async fn get(&self) -> Result<Option<Interval>, StoreError> {
        Ok(self.lock().open.clone())
    }

    async fn set(&self, interval: &Interval) -> Result<(), StoreError> {
        self.lock().open = Some(interval.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().open = None;
        Ok(())
    }
}
