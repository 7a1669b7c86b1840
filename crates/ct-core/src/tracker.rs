//! Contraction lifecycle state machine.
//!
//! The tracker owns two pieces of durable state through its store: the single
//! open contraction and the ordered history of closed intervals. Every mutation
//! goes through one async mutex, so the read-decide-write sequence of a toggle
//! can never interleave with another toggle, a reset, or the migration.
//!
//! # Closing a contraction
//!
//! 1. The open contraction `C` is closed at `now`
//! 2. If the last history entry is a closed contraction and the policy is
//!    [`BreakPolicy::Synthesize`], a break spanning the gap is appended together
//!    with `C` in one batch (break first)
//! 3. The open slot is cleared only after the history write succeeded, so a
//!    failed write leaves the contraction open instead of losing its end

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::interval::{Interval, IntervalKey, IntervalKind};
use crate::store::{HistoryStore, OpenIntervalSlot, StoreError};

/// Whether breaks between contractions are written to history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakPolicy {
    /// Append a break spanning the gap whenever a contraction closes.
    #[default]
    Synthesize,
    /// Persist contractions only. Breaks are derived at read time.
    ContractionsOnly,
}

/// Tracker errors.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Stop requested with no open contraction.
    #[error("tried to end a contraction that hasn't been started")]
    ContractionNotStarted,
    /// Start requested while an interval is already open.
    #[error("a contraction has been in progress since {since}")]
    AlreadyTracking { since: DateTime<Utc> },
    /// The store rejected a read or write. Tracker state was not advanced.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Started(Interval),
    Stopped(Recorded),
}

/// Intervals appended to history by closing a contraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub contraction: Interval,
    /// The synthesized break preceding `contraction`, if one was written.
    pub gap: Option<Interval>,
}

/// Owns the open-contraction slot and the history append path.
pub struct IntervalTracker<S> {
    store: Mutex<S>,
    policy: BreakPolicy,
}

impl<S> IntervalTracker<S>
where
    S: HistoryStore + OpenIntervalSlot,
{
    /// Wraps `store` without touching its contents.
    pub fn new(store: S, policy: BreakPolicy) -> Self {
        Self {
            store: Mutex::new(store),
            policy,
        }
    }

    /// Wraps `store` and runs the one-time break migration when the policy
    /// persists contractions only.
    pub async fn open(store: S, policy: BreakPolicy) -> Result<Self, TrackerError> {
        let tracker = Self::new(store, policy);
        if policy == BreakPolicy::ContractionsOnly {
            tracker.migrate_history().await?;
        }
        Ok(tracker)
    }

    pub const fn policy(&self) -> BreakPolicy {
        self.policy
    }

    /// True iff the open slot holds a contraction.
    pub async fn is_tracking_contraction(&self) -> Result<bool, TrackerError> {
        let store = self.store.lock().await;
        Ok(is_contraction(store.get().await?.as_ref()))
    }

    /// The open interval, if any.
    pub async fn open_interval(&self) -> Result<Option<Interval>, TrackerError> {
        let store = self.store.lock().await;
        Ok(store.get().await?)
    }

    /// A snapshot of the recorded history, ordered by start.
    pub async fn history(&self) -> Result<Vec<Interval>, TrackerError> {
        let store = self.store.lock().await;
        Ok(store.read_all().await?)
    }

    /// Starts a contraction if none is being tracked, otherwise stops it.
    pub async fn toggle(&self, now: DateTime<Utc>) -> Result<Toggle, TrackerError> {
        let store = self.store.lock().await;
        let open = store.get().await?;
        if is_contraction(open.as_ref()) {
            close_contraction(&*store, self.policy, open, now)
                .await
                .map(Toggle::Stopped)
        } else {
            open_contraction(&*store, open, now)
                .await
                .map(Toggle::Started)
        }
    }

    /// Opens a contraction at `now`.
    pub async fn start(&self, now: DateTime<Utc>) -> Result<Interval, TrackerError> {
        let store = self.store.lock().await;
        let open = store.get().await?;
        open_contraction(&*store, open, now).await
    }

    /// Closes the open contraction at `now` and records it.
    pub async fn stop(&self, now: DateTime<Utc>) -> Result<Recorded, TrackerError> {
        let store = self.store.lock().await;
        let open = store.get().await?;
        close_contraction(&*store, self.policy, open, now).await
    }

    /// Empties history and clears the open slot. Irreversible.
    pub async fn reset(&self) -> Result<(), TrackerError> {
        let store = self.store.lock().await;
        store.remove_all().await?;
        store.clear().await?;
        tracing::info!("cleared contraction history");
        Ok(())
    }

    /// Drops persisted breaks from history, keeping contractions only.
    ///
    /// Returns how many intervals were removed. Running it on a history that
    /// already holds only contractions writes nothing.
    pub async fn migrate_history(&self) -> Result<usize, TrackerError> {
        let store = self.store.lock().await;
        let history = store.read_all().await?;
        let total = history.len();
        let contractions: Vec<Interval> = history
            .into_iter()
            .filter(Interval::is_contraction)
            .collect();

        let removed = total - contractions.len();
        if removed == 0 {
            tracing::debug!(total, "history already migrated");
            return Ok(0);
        }

        store.replace_all(&contractions).await?;
        tracing::info!(removed, kept = contractions.len(), "migrated break intervals out of history");
        Ok(removed)
    }
}

fn is_contraction(open: Option<&Interval>) -> bool {
    open.is_some_and(Interval::is_contraction)
}

async fn open_contraction<S>(
    store: &S,
    open: Option<Interval>,
    now: DateTime<Utc>,
) -> Result<Interval, TrackerError>
where
    S: OpenIntervalSlot + ?Sized,
{
    if let Some(open) = open {
        tracing::warn!(since = %open.start, kind = %open.kind, "tried to start a contraction while one was ongoing");
        return Err(TrackerError::AlreadyTracking { since: open.start });
    }

    let contraction = Interval::contraction(now);
    store.set(&contraction).await?;
    tracing::debug!(start = %now, "contraction started");
    Ok(contraction)
}

async fn close_contraction<S>(
    store: &S,
    policy: BreakPolicy,
    open: Option<Interval>,
    now: DateTime<Utc>,
) -> Result<Recorded, TrackerError>
where
    S: HistoryStore + OpenIntervalSlot + ?Sized,
{
    let Some(open) = open.filter(Interval::is_contraction) else {
        tracing::warn!("tried to end a contraction that hasn't started");
        return Err(TrackerError::ContractionNotStarted);
    };

    let end = if IntervalKey::from(now) < open.key() {
        tracing::warn!(start = %open.start, now = %now, "clock moved backwards; closing contraction at its start");
        open.start
    } else {
        now
    };
    let contraction = open.closed_at(end);

    let gap = match policy {
        BreakPolicy::Synthesize => store
            .last()
            .await?
            .and_then(|last| gap_before(&last, &contraction)),
        BreakPolicy::ContractionsOnly => None,
    };

    let mut batch = Vec::with_capacity(2);
    batch.extend(gap.iter().cloned());
    batch.push(contraction.clone());
    store.append(&batch).await?;

    // History now holds the contraction. If this clear fails the slot stays
    // open, and the next stop re-upserts the same key with a later end.
    store.clear().await?;

    tracing::info!(
        start = %contraction.start,
        length_secs = contraction.length().map_or(0, |d| d.num_seconds()),
        with_break = gap.is_some(),
        "contraction recorded"
    );
    Ok(Recorded { contraction, gap })
}

/// The break between a previous closed contraction and the one now closing.
fn gap_before(last: &Interval, contraction: &Interval) -> Option<Interval> {
    if !last.is_contraction() {
        return None;
    }
    let prior_end = last.end?;
    let prior_key = IntervalKey::from(prior_end);
    if prior_key < contraction.key() {
        Some(Interval::closed(
            IntervalKind::Break,
            prior_end,
            contraction.start,
        ))
    } else {
        if prior_key > contraction.key() {
            tracing::warn!(
                prior_end = %prior_end,
                start = %contraction.start,
                "contraction overlaps the previous one; not recording a break"
            );
        }
        None
    }
}
