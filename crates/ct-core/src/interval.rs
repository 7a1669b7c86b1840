//! Recorded time intervals: contractions and the breaks between them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// What a recorded interval represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalKind {
    Contraction,
    Break,
}

impl IntervalKind {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Contraction => "contraction",
            Self::Break => "break",
        }
    }
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IntervalKind {
    type Err = UnknownIntervalKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contraction" => Ok(Self::Contraction),
            "break" => Ok(Self::Break),
            _ => Err(UnknownIntervalKind(s.to_string())),
        }
    }
}

impl Serialize for IntervalKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IntervalKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown interval kind strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interval kind: {0}")]
pub struct UnknownIntervalKind(String);

/// Unique storage key of an interval: its start in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalKey(i64);

impl IntervalKey {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }
}

impl From<DateTime<Utc>> for IntervalKey {
    fn from(start: DateTime<Utc>) -> Self {
        Self(start.timestamp_micros())
    }
}

impl fmt::Display for IntervalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drops sub-microsecond precision, which storage cannot represent.
fn to_micros(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(6)
}

/// A contraction or break with a start and an optional end.
///
/// An interval without an `end` is still open. Only the single open contraction
/// held by the tracker is ever in that state; everything in history is closed.
///
/// The constructors truncate timestamps to whole microseconds so that
/// [`IntervalKey`] ordering and timestamp ordering agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub kind: IntervalKind,
}

impl Interval {
    /// Opens a contraction at `start`.
    pub fn contraction(start: DateTime<Utc>) -> Self {
        Self {
            start: to_micros(start),
            end: None,
            kind: IntervalKind::Contraction,
        }
    }

    /// A closed interval of the given kind.
    pub fn closed(kind: IntervalKind, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: to_micros(start),
            end: Some(to_micros(end)),
            kind,
        }
    }

    pub fn key(&self) -> IntervalKey {
        IntervalKey::from(self.start)
    }

    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn is_contraction(&self) -> bool {
        self.kind == IntervalKind::Contraction
    }

    /// `end - start`, if the interval is closed.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    /// Length of a closed contraction. Breaks have no length.
    pub fn length(&self) -> Option<Duration> {
        if self.is_contraction() {
            self.duration()
        } else {
            None
        }
    }

    /// Returns a copy closed at `end`.
    #[must_use]
    pub fn closed_at(&self, end: DateTime<Utc>) -> Self {
        Self {
            start: self.start,
            end: Some(to_micros(end)),
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn kind_roundtrips_through_strings() {
        for kind in [IntervalKind::Contraction, IntervalKind::Break] {
            let parsed: IntervalKind = kind.to_string().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_kind_errors() {
        let err = "pause".parse::<IntervalKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown interval kind: pause");
    }

    #[test]
    fn open_contraction_has_no_length() {
        let interval = Interval::contraction(at(0));
        assert!(interval.is_open());
        assert!(interval.length().is_none());

        let closed = interval.closed_at(at(45));
        assert_eq!(closed.length(), Some(Duration::seconds(45)));
        assert_eq!(closed.key(), interval.key());
    }

    #[test]
    fn constructors_truncate_to_microseconds() {
        let start = at(0) + Duration::nanoseconds(1_500);
        let open = Interval::contraction(start);
        assert_eq!(open.start, at(0) + Duration::microseconds(1));

        let closed = open.closed_at(at(30) + Duration::nanoseconds(999));
        assert_eq!(closed.end, Some(at(30)));
        assert_eq!(closed.key(), IntervalKey::from(start));
    }

    #[test]
    fn break_has_duration_but_no_length() {
        let gap = Interval::closed(IntervalKind::Break, at(30), at(90));
        assert_eq!(gap.duration(), Some(Duration::seconds(60)));
        assert!(gap.length().is_none());
    }

    #[test]
    fn key_distinguishes_sub_second_starts() {
        let first = at(0);
        let second = first + Duration::microseconds(1);
        assert_ne!(IntervalKey::from(first), IntervalKey::from(second));
    }

    #[test]
    fn serializes_kind_as_snake_case_and_skips_missing_end() {
        let json = serde_json::to_string(&Interval::contraction(at(0))).unwrap();
        assert!(json.contains(r#""kind":"contraction""#));
        assert!(!json.contains("end"));

        let parsed: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Interval::contraction(at(0)));
    }
}
