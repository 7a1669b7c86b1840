//! History command for listing recorded intervals.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use ct_core::{HistoryStore, Interval, IntervalTracker, OpenIntervalSlot};
use serde::Serialize;

use super::util::format_optional;

#[derive(Debug, Serialize)]
struct JsonHistory<'a> {
    intervals: &'a [Interval],
    open: Option<&'a Interval>,
}

fn format_time<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.with_timezone(tz).format("%H:%M:%S").to_string()
}

/// Renders one line per interval, oldest first, with times shown in `tz`.
pub fn format_history<Tz: TimeZone>(
    intervals: &[Interval],
    open: Option<&Interval>,
    tz: &Tz,
) -> Result<String>
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    if intervals.is_empty() && open.is_none() {
        writeln!(out, "No contractions recorded.")?;
        return Ok(out);
    }

    writeln!(out, "{:<12} {:<9} {:<9} Duration", "Kind", "Start", "End")?;
    for interval in intervals {
        let end = interval
            .end
            .map_or_else(|| "--".to_string(), |end| format_time(end, tz));
        writeln!(
            out,
            "{:<12} {:<9} {:<9} {}",
            interval.kind.as_str(),
            format_time(interval.start, tz),
            end,
            format_optional(interval.duration())
        )?;
    }
    if let Some(open) = open {
        writeln!(
            out,
            "{:<12} {:<9} {:<9} (in progress)",
            open.kind.as_str(),
            format_time(open.start, tz),
            "--"
        )?;
    }
    Ok(out)
}

pub async fn run<W, S>(writer: &mut W, tracker: &IntervalTracker<S>, json: bool) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    let intervals = tracker.history().await?;
    let open = tracker.open_interval().await?;

    if json {
        let history = JsonHistory {
            intervals: &intervals,
            open: open.as_ref(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&history)?)?;
    } else {
        write!(writer, "{}", format_history(&intervals, open.as_ref(), &Local)?)?;
    }
    Ok(())
}
