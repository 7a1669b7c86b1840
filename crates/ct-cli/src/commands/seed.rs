//! Seed command: replace history with a sample series of contractions.
//!
//! The series speeds up over roughly an hour and a half, from ten-minute gaps
//! down to three, and is recorded through the tracker's own toggle so breaks
//! follow the configured policy.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use ct_core::{HistoryStore, IntervalTracker, OpenIntervalSlot};

/// Contraction lengths in seconds.
const LENGTHS: [i64; 10] = [75, 35, 50, 50, 55, 45, 60, 58, 63, 50];

/// Rest after each contraction, in seconds.
const RESTS: [i64; 10] = [600, 540, 540, 480, 480, 480, 480, 420, 300, 180];

/// `(start, end)` of every sample contraction, with the last rest ending at `now`.
pub fn sample_contractions(now: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let total: i64 = LENGTHS.iter().chain(RESTS.iter()).sum();
    let mut current = now - Duration::seconds(total);
    LENGTHS
        .iter()
        .zip(RESTS.iter())
        .map(|(&length, &rest)| {
            let start = current;
            let end = start + Duration::seconds(length);
            current = end + Duration::seconds(rest);
            (start, end)
        })
        .collect()
}

pub async fn run<W, S>(writer: &mut W, tracker: &IntervalTracker<S>, now: DateTime<Utc>) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    tracker.reset().await?;
    let samples = sample_contractions(now);
    for (start, end) in &samples {
        tracker.start(*start).await?;
        tracker.stop(*end).await?;
    }
    tracing::info!(count = samples.len(), "seeded sample contractions");
    writeln!(writer, "Seeded {} sample contractions.", samples.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ct_core::{BreakPolicy, Interval, IntervalKind, MemoryStore, metrics};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap()
    }

    #[test]
    fn samples_end_one_rest_before_now() {
        let samples = sample_contractions(now());
        assert_eq!(samples.len(), 10);
        let (_, last_end) = samples[samples.len() - 1];
        assert_eq!(last_end, now() - Duration::seconds(180));
    }

    #[tokio::test]
    async fn seed_replaces_history_through_the_tracker() {
        let store = MemoryStore::with_state(
            vec![Interval::closed(
                IntervalKind::Contraction,
                now() - Duration::days(1),
                now() - Duration::days(1) + Duration::seconds(20),
            )],
            None,
        );
        let tracker = IntervalTracker::new(store, BreakPolicy::Synthesize);

        let mut output = Vec::new();
        run(&mut output, &tracker, now()).await.unwrap();

        let history = tracker.history().await.unwrap();
        let contractions = history.iter().filter(|i| i.is_contraction()).count();
        assert_eq!(contractions, 10);
        assert_eq!(history.len(), 19);
        assert_eq!(
            metrics::last_frequency(&history),
            Some(Duration::seconds(63 + 300))
        );
        assert!(!tracker.is_tracking_contraction().await.unwrap());
    }
}
