//! Contraction statistics.
//!
//! Every function here is pure: it takes a history snapshot ordered by start and
//! never touches the tracker. Only contraction intervals participate; breaks in
//! the input are skipped, so histories written under either
//! [`BreakPolicy`](crate::BreakPolicy) give the same numbers.
//!
//! "Frequency" is the start-to-start gap between consecutive contractions, not
//! a rate. "Length" is `end - start` of one contraction.
//!
//! Statistics that are undefined for the input (a mean over zero samples, an
//! extremum of nothing) come back as `None` rather than a NaN or a zero.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// Look-back window for the "last hour" statistics.
pub const LAST_HOUR_SECS: i64 = 3600;

/// Smallest and largest of a set of durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMax {
    pub min: Duration,
    pub max: Duration,
}

impl MinMax {
    fn of(values: impl IntoIterator<Item = Duration>) -> Option<Self> {
        values.into_iter().fold(None, |acc, value| {
            Some(match acc {
                None => Self {
                    min: value,
                    max: value,
                },
                Some(Self { min, max }) => Self {
                    min: min.min(value),
                    max: max.max(value),
                },
            })
        })
    }
}

/// Thresholds for [`should_alert_hospital`].
///
/// The defaults are a placeholder heuristic with no clinical citation behind
/// them. Hosts are expected to override them from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Mean contraction length must exceed this. Default: 45 seconds.
    pub min_mean_length_secs: i64,
    /// Mean frequency must be below this. Default: 300 seconds (5 minutes).
    pub max_mean_frequency_secs: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_mean_length_secs: 45,
            max_mean_frequency_secs: 300,
        }
    }
}

impl AlertThresholds {
    pub fn min_mean_length(&self) -> Duration {
        Duration::seconds(self.min_mean_length_secs)
    }

    pub fn max_mean_frequency(&self) -> Duration {
        Duration::seconds(self.max_mean_frequency_secs)
    }
}

fn only_contractions(history: &[Interval]) -> impl Iterator<Item = &Interval> {
    history.iter().filter(|interval| interval.is_contraction())
}

fn in_last_hour(interval: &Interval, now: DateTime<Utc>) -> bool {
    let since = now - Duration::seconds(LAST_HOUR_SECS);
    interval.start >= since && interval.start <= now
}

fn total(values: &[Duration]) -> Option<Duration> {
    values
        .iter()
        .try_fold(Duration::zero(), |acc, value| acc.checked_add(value))
}

/// Mean at nanosecond precision; the remainder of the division is dropped.
fn mean(values: &[Duration]) -> Option<Duration> {
    if values.is_empty() {
        return None;
    }
    let count = i32::try_from(values.len()).ok()?;
    Some(total(values)? / count)
}

/// Compares the mean of `values` against `threshold` without dividing, so a
/// mean a few nanoseconds past the threshold still counts.
fn compare_mean(values: &[Duration], threshold: Duration) -> Option<Ordering> {
    if values.is_empty() {
        return None;
    }
    let count = i32::try_from(values.len()).ok()?;
    let scaled = threshold.checked_mul(count)?;
    Some(total(values)?.cmp(&scaled))
}

fn contraction_lengths(history: &[Interval]) -> Vec<Duration> {
    only_contractions(history).filter_map(Interval::length).collect()
}

/// Start-to-start gaps between adjacent contractions, by position.
///
/// A negative gap means the history is out of order; it is logged and left out.
pub fn frequencies(history: &[Interval]) -> Vec<Duration> {
    let contractions: Vec<&Interval> = only_contractions(history).collect();
    contractions
        .windows(2)
        .filter_map(|pair| {
            let gap = pair[1].start - pair[0].start;
            if gap < Duration::zero() {
                tracing::warn!(
                    previous = %pair[0].start,
                    current = %pair[1].start,
                    "contraction history out of order; skipping negative gap"
                );
                None
            } else {
                Some(gap)
            }
        })
        .collect()
}

/// Most recent entry of [`frequencies`].
///
/// Needs at least three contractions, so a lone first gap is never reported as
/// the "current" frequency. An out-of-order final pair is skipped the same way
/// [`frequencies`] skips it.
pub fn last_frequency(history: &[Interval]) -> Option<Duration> {
    if only_contractions(history).count() < 3 {
        return None;
    }
    frequencies(history).last().copied()
}

pub fn min_max_frequency(history: &[Interval]) -> Option<MinMax> {
    MinMax::of(frequencies(history))
}

/// [`min_max_frequency`] over contractions that started within the last hour.
pub fn last_hour_min_max_frequency(history: &[Interval], now: DateTime<Utc>) -> Option<MinMax> {
    let recent: Vec<Interval> = only_contractions(history)
        .filter(|interval| in_last_hour(interval, now))
        .cloned()
        .collect();
    min_max_frequency(&recent)
}

pub fn mean_frequency(history: &[Interval]) -> Option<Duration> {
    mean(&frequencies(history))
}

/// Length of the most recent contraction, if it has ended.
pub fn last_contraction_length(history: &[Interval]) -> Option<Duration> {
    only_contractions(history).last()?.length()
}

/// Shortest and longest closed contraction that started within the last hour.
pub fn min_max_contraction_length(history: &[Interval], now: DateTime<Utc>) -> Option<MinMax> {
    MinMax::of(
        only_contractions(history)
            .filter(|interval| in_last_hour(interval, now))
            .filter_map(Interval::length),
    )
}

pub fn mean_contraction_length(history: &[Interval]) -> Option<Duration> {
    mean(&contraction_lengths(history))
}

/// Whether contractions are long and close enough together to head to the
/// hospital: mean length above `thresholds.min_mean_length` and mean frequency
/// below `thresholds.max_mean_frequency`, both strict.
///
/// Returns `false` when either mean is undefined.
pub fn should_alert_hospital(history: &[Interval], thresholds: &AlertThresholds) -> bool {
    let length = compare_mean(&contraction_lengths(history), thresholds.min_mean_length());
    let frequency = compare_mean(&frequencies(history), thresholds.max_mean_frequency());
    matches!(
        (length, frequency),
        (Some(Ordering::Greater), Some(Ordering::Less))
    )
}

/// Every statistic for one history snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub contractions: usize,
    pub last_frequency: Option<Duration>,
    pub frequency: Option<MinMax>,
    pub last_hour_frequency: Option<MinMax>,
    pub mean_frequency: Option<Duration>,
    pub last_length: Option<Duration>,
    pub last_hour_length: Option<MinMax>,
    pub mean_length: Option<Duration>,
    pub should_alert_hospital: bool,
}

impl MetricsSummary {
    pub fn compute(history: &[Interval], now: DateTime<Utc>, thresholds: &AlertThresholds) -> Self {
        Self {
            contractions: only_contractions(history).count(),
            last_frequency: last_frequency(history),
            frequency: min_max_frequency(history),
            last_hour_frequency: last_hour_min_max_frequency(history, now),
            mean_frequency: mean_frequency(history),
            last_length: last_contraction_length(history),
            last_hour_length: min_max_contraction_length(history, now),
            mean_length: mean_contraction_length(history),
            should_alert_hospital: should_alert_hospital(history, thresholds),
        }
    }
}
