//! Reset command: wipe history and any contraction in progress.

use std::io::Write;

use anyhow::Result;
use ct_core::{HistoryStore, IntervalTracker, OpenIntervalSlot};

pub async fn run<W, S>(writer: &mut W, tracker: &IntervalTracker<S>, confirmed: bool) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    if !confirmed {
        anyhow::bail!("refusing to delete contraction history without --yes");
    }

    tracker.reset().await?;
    writeln!(writer, "Contraction history cleared.")?;
    Ok(())
}
