//! Status command: tracking state plus the statistics summary.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ct_core::{
    AlertThresholds, HistoryStore, Interval, IntervalTracker, MetricsSummary, MinMax,
    OpenIntervalSlot,
};
use serde::Serialize;

use super::util::{format_duration, format_optional};

/// A min/max pair in whole seconds.
#[derive(Debug, Serialize)]
struct JsonRange {
    min_secs: i64,
    max_secs: i64,
}

impl From<MinMax> for JsonRange {
    fn from(range: MinMax) -> Self {
        Self {
            min_secs: range.min.num_seconds(),
            max_secs: range.max.num_seconds(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonStatus {
    tracking: bool,
    open_since: Option<DateTime<Utc>>,
    contractions: usize,
    last_length_secs: Option<i64>,
    mean_length_secs: Option<i64>,
    last_hour_length: Option<JsonRange>,
    last_frequency_secs: Option<i64>,
    mean_frequency_secs: Option<i64>,
    frequency: Option<JsonRange>,
    last_hour_frequency: Option<JsonRange>,
    should_alert_hospital: bool,
}

fn format_range(range: Option<MinMax>) -> String {
    range.map_or_else(
        || "--".to_string(),
        |range| {
            format!(
                "{} to {}",
                format_duration(range.min),
                format_duration(range.max)
            )
        },
    )
}

/// Renders the human-readable status report.
pub fn format_status(
    open: Option<&Interval>,
    summary: &MetricsSummary,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut out = String::new();

    match open.filter(|interval| interval.is_contraction()) {
        Some(interval) => writeln!(
            out,
            "Tracking: contraction in progress ({})",
            format_duration(now - interval.start)
        )?,
        None => writeln!(out, "Tracking: no contraction in progress")?,
    }
    writeln!(out, "Contractions: {}", summary.contractions)?;
    writeln!(out)?;

    writeln!(out, "Length")?;
    writeln!(out, "  last:      {}", format_optional(summary.last_length))?;
    writeln!(out, "  mean:      {}", format_optional(summary.mean_length))?;
    writeln!(out, "  last hour: {}", format_range(summary.last_hour_length))?;
    writeln!(out)?;

    writeln!(out, "Frequency")?;
    writeln!(out, "  last:      {}", format_optional(summary.last_frequency))?;
    writeln!(out, "  mean:      {}", format_optional(summary.mean_frequency))?;
    writeln!(out, "  overall:   {}", format_range(summary.frequency))?;
    writeln!(out, "  last hour: {}", format_range(summary.last_hour_frequency))?;
    writeln!(out)?;

    let alert = if summary.should_alert_hospital {
        "yes"
    } else {
        "no"
    };
    writeln!(out, "Head to the hospital: {alert}")?;

    Ok(out)
}

/// Renders the status report as JSON.
pub fn format_status_json(open: Option<&Interval>, summary: &MetricsSummary) -> Result<String> {
    let open = open.filter(|interval| interval.is_contraction());
    let status = JsonStatus {
        tracking: open.is_some(),
        open_since: open.map(|interval| interval.start),
        contractions: summary.contractions,
        last_length_secs: summary.last_length.map(|d| d.num_seconds()),
        mean_length_secs: summary.mean_length.map(|d| d.num_seconds()),
        last_hour_length: summary.last_hour_length.map(JsonRange::from),
        last_frequency_secs: summary.last_frequency.map(|d| d.num_seconds()),
        mean_frequency_secs: summary.mean_frequency.map(|d| d.num_seconds()),
        frequency: summary.frequency.map(JsonRange::from),
        last_hour_frequency: summary.last_hour_frequency.map(JsonRange::from),
        should_alert_hospital: summary.should_alert_hospital,
    };
    Ok(serde_json::to_string_pretty(&status)?)
}

pub async fn run<W, S>(
    writer: &mut W,
    tracker: &IntervalTracker<S>,
    now: DateTime<Utc>,
    thresholds: &AlertThresholds,
    json: bool,
) -> Result<()>
where
    W: Write,
    S: HistoryStore + OpenIntervalSlot,
{
    let open = tracker.open_interval().await?;
    let history = tracker.history().await?;
    let summary = MetricsSummary::compute(&history, now, thresholds);

    if json {
        writeln!(writer, "{}", format_status_json(open.as_ref(), &summary)?)?;
    } else {
        write!(writer, "{}", format_status(open.as_ref(), &summary, now)?)?;
    }
    Ok(())
}
