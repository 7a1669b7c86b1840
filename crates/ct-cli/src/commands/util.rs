//! Shared utilities for CLI commands.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(second|minute|hour)s?\s+ago$").unwrap());

/// Contractions are entered live; anything further back than a day is a typo.
const MAX_RELATIVE_SECONDS: i64 = 24 * 60 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "30 seconds ago", "2 minutes ago", "1 hour ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let seconds_per_unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 60 * 60,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_SECONDS / seconds_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::seconds(n * seconds_per_unit))
}

/// Formats a duration as minutes and zero-padded seconds, e.g. `4m 05s`.
///
/// Negative durations render as zero.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let minutes = total / 60;
    let seconds = total % 60;
    format!("{minutes}m {seconds:02}s")
}

/// Formats an optional statistic, using `--` when it is undefined.
pub fn format_optional(duration: Option<Duration>) -> String {
    duration.map_or_else(|| "--".to_string(), format_duration)
}

fn lock_path(database_path: &Path) -> PathBuf {
    let mut name = database_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lock");
    database_path.with_file_name(name)
}

/// Takes an exclusive advisory lock next to the database.
///
/// The lock is held until the returned file is dropped, so two `ct` processes
/// cannot interleave a read-decide-write sequence on the same history.
pub fn lock_database(database_path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = database_path.parent() {
        fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let lock_file =
        File::create(lock_path(database_path)).context("failed to create lock file")?;
    lock_file
        .lock_exclusive()
        .context("failed to acquire lock")?;
    Ok(lock_file)
}
