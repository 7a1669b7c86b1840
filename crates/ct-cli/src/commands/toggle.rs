//! Toggle command: start a contraction, or record the one in progress.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use ct_core::{AlertThresholds, HistoryStore, IntervalTracker, OpenIntervalSlot, Toggle, metrics};

use super::util::{format_duration, format_optional};

pub async fn run<W, S>(
    writer: &mut W,
    tracker: &IntervalTracker<S>,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    match tracker.toggle(now).await? {
        Toggle::Started(interval) => {
            let started = interval.start.with_timezone(&Local);
            writeln!(writer, "Contraction started at {}", started.format("%H:%M:%S"))?;
        }
        Toggle::Stopped(recorded) => {
            writeln!(
                writer,
                "Contraction recorded: {}",
                format_optional(recorded.contraction.length())
            )?;

            let history = tracker.history().await?;
            if let Some(gap) = metrics::frequencies(&history).last() {
                writeln!(writer, "Since previous contraction: {}", format_duration(*gap))?;
            }
            if metrics::should_alert_hospital(&history, thresholds) {
                writeln!(
                    writer,
                    "Contractions are long and close together. Consider heading to the hospital."
                )?;
            }
        }
    }
    Ok(())
}
