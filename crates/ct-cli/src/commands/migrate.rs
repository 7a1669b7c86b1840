//! Migrate command: drop stored breaks, keeping contractions only.

use std::io::Write;

use anyhow::Result;
use ct_core::{HistoryStore, IntervalTracker, OpenIntervalSlot};

pub async fn run<W, S>(writer: &mut W, tracker: &IntervalTracker<S>) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    let removed = tracker.migrate_history().await?;
    if removed == 0 {
        writeln!(writer, "History already holds contractions only.")?;
    } else {
        writeln!(writer, "Removed {removed} break interval(s).")?;
    }
    Ok(())
}
