//! Storage layer for the contraction tracker.
//!
//! Provides a SQLite backend for [`HistoryStore`] and [`OpenIntervalSlot`] using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! A `rusqlite::Connection` is `Send` but not `Sync`, so [`Database`] keeps it
//! behind a `Mutex`. The async trait methods run their statements inline while
//! holding that lock; every statement touches at most a handful of rows.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as INTEGER microseconds since the Unix epoch (UTC).
//! `intervals.start_us` doubles as the primary key, so appending an interval
//! whose start is already recorded replaces the old row.
//!
//! ## Open Interval
//!
//! The open contraction lives in `open_interval`, a table constrained to at most
//! one row. It is written independently of `intervals`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ct_core::{HistoryStore, Interval, IntervalKind, OpenIntervalSlot, StoreError, UnknownIntervalKind};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp is outside the range chrono can represent.
    #[error("invalid timestamp: {micros}us")]
    InvalidTimestamp { micros: i64 },
    /// A stored interval kind is not recognized.
    #[error(transparent)]
    UnknownKind(#[from] UnknownIntervalKind),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn().execute_batch(
            "
            -- Closed intervals, keyed by start
            -- kind: 'contraction' or 'break'
            CREATE TABLE IF NOT EXISTS intervals (
                start_us INTEGER PRIMARY KEY,
                end_us INTEGER,
                kind TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS open_interval (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                start_us INTEGER NOT NULL,
                end_us INTEGER,
                kind TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Upserts a batch of intervals in one transaction.
    pub fn insert_intervals(&self, intervals: &[Interval]) -> Result<usize, DbError> {
        if intervals.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let inserted = insert_all(&tx, intervals)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists all intervals ordered by start.
    pub fn list_intervals(&self) -> Result<Vec<Interval>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "
            SELECT start_us, end_us, kind
            FROM intervals
            ORDER BY start_us ASC
            ",
        )?;
        let rows = stmt.query_map([], read_row)?;
        let mut intervals = Vec::new();
        for row in rows {
            intervals.push(to_interval(row?)?);
        }
        Ok(intervals)
    }

    /// Returns the interval with the latest start.
    pub fn last_interval(&self) -> Result<Option<Interval>, DbError> {
        let row = self
            .conn()
            .query_row(
                "SELECT start_us, end_us, kind FROM intervals ORDER BY start_us DESC LIMIT 1",
                [],
                read_row,
            )
            .optional()?;
        row.map(to_interval).transpose()
    }

    /// Deletes every recorded interval.
    pub fn clear_intervals(&self) -> Result<usize, DbError> {
        Ok(self.conn().execute("DELETE FROM intervals", [])?)
    }

    /// Replaces the whole history in one transaction.
    pub fn replace_intervals(&self, intervals: &[Interval]) -> Result<(), DbError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM intervals", [])?;
        insert_all(&tx, intervals)?;
        tx.commit()?;
        Ok(())
    }

    /// Returns the open interval, if one is stored.
    pub fn open_interval(&self) -> Result<Option<Interval>, DbError> {
        let row = self
            .conn()
            .query_row(
                "SELECT start_us, end_us, kind FROM open_interval WHERE slot = 0",
                [],
                read_row,
            )
            .optional()?;
        row.map(to_interval).transpose()
    }

    /// Stores `interval` as the open interval, replacing any previous one.
    pub fn set_open_interval(&self, interval: &Interval) -> Result<(), DbError> {
        self.conn().execute(
            "
            INSERT INTO open_interval (slot, start_us, end_us, kind)
            VALUES (0, ?, ?, ?)
            ON CONFLICT(slot) DO UPDATE SET
                start_us = excluded.start_us,
                end_us = excluded.end_us,
                kind = excluded.kind
            ",
            params![
                interval.start.timestamp_micros(),
                interval.end.map(|end| end.timestamp_micros()),
                interval.kind.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn clear_open_interval(&self) -> Result<(), DbError> {
        self.conn().execute("DELETE FROM open_interval", [])?;
        Ok(())
    }
}

type IntervalRow = (i64, Option<i64>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<IntervalRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn to_interval((start_us, end_us, kind): IntervalRow) -> Result<Interval, DbError> {
    Ok(Interval {
        start: from_micros(start_us)?,
        end: end_us.map(from_micros).transpose()?,
        kind: kind.parse::<IntervalKind>()?,
    })
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_micros(micros).ok_or(DbError::InvalidTimestamp { micros })
}

fn insert_all(conn: &Connection, intervals: &[Interval]) -> Result<usize, DbError> {
    let mut stmt = conn.prepare(
        "
        INSERT OR REPLACE INTO intervals (start_us, end_us, kind)
        VALUES (?, ?, ?)
        ",
    )?;
    let mut inserted = 0;
    for interval in intervals {
        inserted += stmt.execute(params![
            interval.key().as_micros(),
            interval.end.map(|end| end.timestamp_micros()),
            interval.kind.as_str(),
        ])?;
    }
    Ok(inserted)
}

#[async_trait]
impl HistoryStore for Database {
    async fn append(&self, intervals: &[Interval]) -> Result<(), StoreError> {
        self.insert_intervals(intervals)
            .map(drop)
            .map_err(|err| StoreError::new("append", err))
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        self.clear_intervals()
            .map(drop)
            .map_err(|err| StoreError::new("remove_all", err))
    }

    async fn read_all(&self) -> Result<Vec<Interval>, StoreError> {
        self.list_intervals()
            .map_err(|err| StoreError::new("read_all", err))
    }

    async fn last(&self) -> Result<Option<Interval>, StoreError> {
        self.last_interval()
            .map_err(|err| StoreError::new("last", err))
    }

    async fn replace_all(&self, intervals: &[Interval]) -> Result<(), StoreError> {
        self.replace_intervals(intervals)
            .map_err(|err| StoreError::new("replace_all", err))
    }
}

#[async_trait]
impl OpenIntervalSlot for Database {
    async fn get(&self) -> Result<Option<Interval>, StoreError> {
        self.open_interval()
            .map_err(|err| StoreError::new("get_open", err))
    }

    async fn set(&self, interval: &Interval) -> Result<(), StoreError> {
        self.set_open_interval(interval)
            .map_err(|err| StoreError::new("set_open", err))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.clear_open_interval()
            .map_err(|err| StoreError::new("clear_open", err))
    }
}

#[cfg(test)]
mod tests {
    use ct_core::{BreakPolicy, IntervalTracker};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn contraction(start: i64, end: i64) -> Interval {
        Interval::closed(IntervalKind::Contraction, at(start), at(end))
    }

    #[test]
    fn init_is_idempotent() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.init().expect("second init");
    }

    #[test]
    fn intervals_roundtrip_in_start_order() {
        let db = Database::open_in_memory().expect("open in-memory db");
        let inserted = db
            .insert_intervals(&[
                contraction(60, 90),
                Interval::closed(IntervalKind::Break, at(30), at(60)),
                contraction(0, 30),
            ])
            .expect("insert intervals");
        assert_eq!(inserted, 3);

        let intervals = db.list_intervals().expect("list intervals");
        assert_eq!(
            intervals,
            vec![
                contraction(0, 30),
                Interval::closed(IntervalKind::Break, at(30), at(60)),
                contraction(60, 90),
            ]
        );
        assert_eq!(db.last_interval().unwrap(), Some(contraction(60, 90)));
    }

    #[test]
    fn insert_replaces_rows_with_same_start() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.insert_intervals(&[contraction(0, 30)]).unwrap();
        db.insert_intervals(&[contraction(0, 45)]).unwrap();

        assert_eq!(db.list_intervals().unwrap(), vec![contraction(0, 45)]);
    }

    #[test]
    fn sub_second_starts_are_distinct_rows() {
        let db = Database::open_in_memory().expect("open in-memory db");
        let first = at(0) + chrono::Duration::microseconds(250);
        let second = at(0) + chrono::Duration::microseconds(750);
        db.insert_intervals(&[
            Interval::closed(IntervalKind::Contraction, first, at(10)),
            Interval::closed(IntervalKind::Contraction, second, at(20)),
        ])
        .unwrap();

        assert_eq!(db.list_intervals().unwrap().len(), 2);
    }

    #[test]
    fn replace_intervals_swaps_history() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.insert_intervals(&[contraction(0, 30), contraction(60, 90)])
            .unwrap();
        db.replace_intervals(&[contraction(200, 230)]).unwrap();

        assert_eq!(db.list_intervals().unwrap(), vec![contraction(200, 230)]);
    }

    #[test]
    fn open_interval_slot_holds_one_row() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert!(db.open_interval().unwrap().is_none());

        db.set_open_interval(&Interval::contraction(at(0))).unwrap();
        db.set_open_interval(&Interval::contraction(at(10))).unwrap();
        assert_eq!(
            db.open_interval().unwrap(),
            Some(Interval::contraction(at(10)))
        );

        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM open_interval", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        db.clear_open_interval().unwrap();
        assert!(db.open_interval().unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_reported() {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.conn()
            .execute(
                "INSERT INTO intervals (start_us, end_us, kind) VALUES (0, 10, 'pause')",
                [],
            )
            .unwrap();

        let err = db.list_intervals().unwrap_err();
        assert!(matches!(err, DbError::UnknownKind(_)));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ct.db");

        {
            let tracker =
                IntervalTracker::new(Database::open(&path).unwrap(), BreakPolicy::Synthesize);
            tracker.toggle(at(0)).await.unwrap();
            tracker.toggle(at(30)).await.unwrap();
            tracker.toggle(at(300)).await.unwrap();
        }

        let tracker = IntervalTracker::new(Database::open(&path).unwrap(), BreakPolicy::Synthesize);
        assert!(tracker.is_tracking_contraction().await.unwrap());

        tracker.toggle(at(345)).await.unwrap();
        let history = tracker.history().await.unwrap();
        assert_eq!(
            history,
            vec![
                contraction(0, 30),
                Interval::closed(IntervalKind::Break, at(30), at(300)),
                contraction(300, 345),
            ]
        );
    }

    #[tokio::test]
    async fn migration_rewrites_stored_history() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intervals(&[
            contraction(0, 30),
            Interval::closed(IntervalKind::Break, at(30), at(300)),
            contraction(300, 345),
        ])
        .unwrap();

        let tracker = IntervalTracker::open(db, BreakPolicy::ContractionsOnly)
            .await
            .unwrap();
        assert_eq!(
            tracker.history().await.unwrap(),
            vec![contraction(0, 30), contraction(300, 345)]
        );
    }
}
