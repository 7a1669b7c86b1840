//! Core domain logic for the contraction tracker.
//!
//! This crate contains:
//! - Intervals: recorded contractions and the breaks between them
//! - Tracking: the open-contraction state machine and its history writes
//! - Storage contracts, plus an in-memory backend
//! - Metrics: frequency and length statistics over a history snapshot

mod interval;
pub mod metrics;
pub mod store;
mod tracker;

pub use interval::{Interval, IntervalKey, IntervalKind, UnknownIntervalKind};
pub use metrics::{AlertThresholds, MetricsSummary, MinMax};
pub use store::{HistoryStore, MemoryStore, OpenIntervalSlot, StoreError};
pub use tracker::{BreakPolicy, IntervalTracker, Recorded, Toggle, TrackerError};
