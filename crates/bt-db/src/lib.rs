//! Storage layer for the baby tracker.
//!
//! Provides persistence for events using `rusqlite`, and [`SqliteGateway`],
//! which exposes the database through the async `EventGateway` contract.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared. [`SqliteGateway`]
//! serializes access with a mutex.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! and a `Z` suffix (e.g., `2025-01-15T10:30:00.000Z`). Lexicographic ordering
//! of these strings matches chronological ordering, which the newest-first
//! queries rely on.
//!
//! ## Event Payload Storage
//!
//! The `type` column stores the event type (e.g., `nursing`) and the `data`
//! column stores the type-specific payload as JSON, including its `type` tag.
//! The two must agree; a mismatch is reported as [`DbError::InvalidEventData`].

mod gateway;

use std::path::Path;

use bt_core::{BabyId, Event, EventId, EventPayload};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use thiserror::Error;

pub use gateway::SqliteGateway;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// An event with this ID is already stored.
    #[error("event already exists: {0}")]
    DuplicateEvent(String),
    /// Failed to parse an event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse event payload JSON or a column held an impossible value.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: String, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A raw event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub baby_id: String,
    pub kind: String,
    pub timestamp: String,
    pub duration_secs: Option<i64>,
    pub notes: Option<String>,
    pub data: String,
}

/// Optional constraints for [`Database::list_events`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventQuery<'a> {
    pub kind: Option<&'a str>,
    /// Inclusive lower bound, in the stored timestamp format.
    pub since: Option<&'a str>,
    pub limit: Option<usize>,
}

impl EventRecord {
    /// Flattens a domain event into its row representation.
    pub fn from_event(event: &Event) -> Result<Self, DbError> {
        let timestamp = bt_core::ensure_storable(event.timestamp).map_err(|err| {
            DbError::InvalidEventData {
                event_id: event.id.to_string(),
                message: err.to_string(),
            }
        })?;
        let duration_secs = event
            .duration_secs
            .map(|secs| {
                i64::try_from(secs).map_err(|_| DbError::InvalidEventData {
                    event_id: event.id.to_string(),
                    message: format!("duration out of range: {secs}"),
                })
            })
            .transpose()?;
        let data = serde_json::to_string(&event.payload).map_err(|err| DbError::InvalidEventData {
            event_id: event.id.to_string(),
            message: err.to_string(),
        })?;

        Ok(Self {
            id: event.id.to_string(),
            baby_id: event.baby_id.to_string(),
            kind: event.event_type().as_str().to_string(),
            timestamp: format_timestamp(timestamp),
            duration_secs,
            notes: event.notes.clone(),
            data,
        })
    }

    /// Rebuilds the domain event, validating every column.
    pub fn into_event(self) -> Result<Event, DbError> {
        let invalid = |message: String| DbError::InvalidEventData {
            event_id: self.id.clone(),
            message,
        };

        let id = EventId::new(self.id.as_str()).map_err(|err| invalid(err.to_string()))?;
        let baby_id = BabyId::new(self.baby_id.as_str()).map_err(|err| invalid(err.to_string()))?;
        let timestamp = parse_timestamp(&self.timestamp, &self.id)?;
        let duration_secs = self
            .duration_secs
            .map(|secs| u64::try_from(secs).map_err(|_| invalid(format!("negative duration: {secs}"))))
            .transpose()?;
        let payload: EventPayload =
            serde_json::from_str(&self.data).map_err(|err| invalid(err.to_string()))?;
        if payload.event_type().as_str() != self.kind {
            return Err(invalid(format!(
                "payload type {} does not match column type {}",
                payload.event_type(),
                self.kind
            )));
        }

        Ok(Event {
            id,
            baby_id,
            timestamp,
            duration_secs,
            notes: self.notes,
            payload,
        })
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            baby_id: row.get(1)?,
            kind: row.get(2)?,
            timestamp: row.get(3)?,
            duration_secs: row.get(4)?,
            notes: row.get(5)?,
            data: row.get(6)?,
        })
    }
}

const EVENT_COLUMNS: &str = "id, baby_id, type, timestamp, duration_secs, notes, data";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- timestamp: RFC 3339 with milliseconds, UTC (e.g., '2025-01-15T10:30:00.000Z')
            -- type: event type (e.g., 'nursing')
            -- data: JSON payload with type-specific fields
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                baby_id TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                duration_secs INTEGER,
                notes TEXT,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_baby_timestamp ON events(baby_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
            ",
        )?;
        Ok(())
    }

    /// Inserts an event, rejecting an ID that is already stored.
    pub fn insert_event(&mut self, event: &EventRecord) -> Result<(), DbError> {
        let created_at = format_timestamp(Utc::now());
        let result = self.conn.execute(
            "
            INSERT INTO events (id, baby_id, type, timestamp, duration_secs, notes, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                event.id,
                event.baby_id,
                event.kind,
                event.timestamp,
                event.duration_secs,
                event.notes,
                event.data,
                created_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(DbError::DuplicateEvent(event.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces a stored event. Returns `false` when no event has this ID.
    pub fn update_event(&mut self, event: &EventRecord) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "
            UPDATE events
            SET baby_id = ?, type = ?, timestamp = ?, duration_secs = ?, notes = ?, data = ?
            WHERE id = ?
            ",
            params![
                event.baby_id,
                event.kind,
                event.timestamp,
                event.duration_secs,
                event.notes,
                event.data,
                event.id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Deletes an event. Returns `false` when no event has this ID.
    pub fn delete_event(&mut self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRecord>, DbError> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
                [id],
                EventRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Lists a baby's events, newest first, ties broken by ID descending.
    pub fn list_events(
        &self,
        baby_id: &str,
        query: EventQuery<'_>,
    ) -> Result<Vec<EventRecord>, DbError> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE baby_id = ?");
        let mut values = vec![Value::Text(baby_id.to_string())];
        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            values.push(Value::Text(kind.to_string()));
        }
        if let Some(since) = query.since {
            sql.push_str(" AND timestamp >= ?");
            values.push(Value::Text(since.to_string()));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), EventRecord::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

fn parse_timestamp(timestamp: &str, event_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_core::{EventDraft, PumpingSide, Side};
    use std::collections::HashSet;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn event(id: &str, baby: &str, at: &str, payload: EventPayload) -> Event {
        EventDraft::new(BabyId::new(baby).expect("baby id"), ts(at), payload)
            .into_event(EventId::new(id).expect("event id"))
    }

    fn record(id: &str, baby: &str, at: &str, payload: EventPayload) -> EventRecord {
        EventRecord::from_event(&event(id, baby, at, payload)).expect("record")
    }

    #[test]
    fn record_rejects_timestamps_that_do_not_round_trip() {
        let mut far = event("far", "b1", "2025-01-01T00:00:00Z", EventPayload::Diaper);
        far.timestamp = ts("9999-12-31T23:59:59Z") + chrono::Duration::days(1);
        let err = EventRecord::from_event(&far).unwrap_err();
        assert!(matches!(err, DbError::InvalidEventData { ref event_id, .. } if event_id == "far"));
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        let events_columns = table_columns(&db.conn, "events");
        assert_eq!(
            events_columns,
            vec![
                "id",
                "baby_id",
                "type",
                "timestamp",
                "duration_secs",
                "notes",
                "data",
                "created_at",
            ]
        );

        let event_indexes = index_names(&db.conn, "events");
        let expected: HashSet<String> = ["idx_events_baby_timestamp", "idx_events_type"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(expected.is_subset(&event_indexes));
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn init_is_idempotent_on_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bt.db");
        {
            let mut db = Database::open(&path).expect("open db");
            db.insert_event(&record(
                "e1",
                "b1",
                "2025-01-01T00:00:00Z",
                EventPayload::Diaper,
            ))
            .expect("insert");
        }

        let db = Database::open(&path).expect("reopen db");
        assert!(db.get_event("e1").expect("get").is_some());
    }

    // ========== Record Conversion Tests ==========

    #[test]
    fn record_uses_millisecond_utc_timestamps() {
        let rec = record(
            "e1",
            "b1",
            "2025-01-01T02:00:00.5+02:00",
            EventPayload::Nursing { side: Side::Left },
        );
        assert_eq!(rec.timestamp, "2025-01-01T00:00:00.500Z");
        assert_eq!(rec.kind, "nursing");
        assert_eq!(rec.data, r#"{"type":"nursing","side":"left"}"#);
    }

    #[test]
    fn record_round_trips_pumping_fields() {
        let original = EventDraft::new(
            BabyId::new("b1").expect("baby id"),
            ts("2025-01-01T08:00:00Z"),
            EventPayload::Pumping {
                pumping_side: Some(PumpingSide::Both),
                milliliters: Some(90),
            },
        )
        .with_duration(Some(600))
        .with_notes(Some("morning".into()))
        .into_event(EventId::new("p1").expect("event id"));

        let restored = EventRecord::from_event(&original)
            .and_then(EventRecord::into_event)
            .expect("round trip");
        assert_eq!(restored, original);
    }

    #[test]
    fn into_event_rejects_type_mismatch() {
        let mut rec = record("e1", "b1", "2025-01-01T00:00:00Z", EventPayload::Sleep);
        rec.kind = "diaper".to_string();
        let err = rec.into_event().unwrap_err();
        assert!(matches!(err, DbError::InvalidEventData { .. }));
    }

    #[test]
    fn into_event_rejects_negative_duration() {
        let mut rec = record("e1", "b1", "2025-01-01T00:00:00Z", EventPayload::Sleep);
        rec.duration_secs = Some(-5);
        assert!(matches!(
            rec.into_event(),
            Err(DbError::InvalidEventData { .. })
        ));
    }

    #[test]
    fn into_event_rejects_bad_timestamp() {
        let mut rec = record("e1", "b1", "2025-01-01T00:00:00Z", EventPayload::Sleep);
        rec.timestamp = "yesterday".to_string();
        assert!(matches!(
            rec.into_event(),
            Err(DbError::TimestampParse { .. })
        ));
    }

    // ========== Query Tests ==========

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let rec = record("e1", "b1", "2025-01-01T00:00:00Z", EventPayload::Diaper);
        db.insert_event(&rec).expect("first insert");

        let err = db.insert_event(&rec).unwrap_err();
        assert!(matches!(err, DbError::DuplicateEvent(id) if id == "e1"));
    }

    #[test]
    fn list_events_is_newest_first_per_baby() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        for rec in [
            record("a", "b1", "2025-01-01T01:00:00Z", EventPayload::Diaper),
            record("b", "b1", "2025-01-01T03:00:00Z", EventPayload::Sleep),
            record("c", "b1", "2025-01-01T02:00:00Z", EventPayload::Bottle),
            record("d", "b2", "2025-01-01T04:00:00Z", EventPayload::Solids),
        ] {
            db.insert_event(&rec).expect("insert");
        }

        let ids: Vec<String> = db
            .list_events("b1", EventQuery::default())
            .expect("list")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn list_events_applies_filters() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        for rec in [
            record("a", "b1", "2025-01-01T01:00:00Z", EventPayload::Diaper),
            record("b", "b1", "2025-01-01T02:00:00Z", EventPayload::Diaper),
            record("c", "b1", "2025-01-01T03:00:00Z", EventPayload::Diaper),
            record("d", "b1", "2025-01-01T04:00:00Z", EventPayload::Sleep),
        ] {
            db.insert_event(&rec).expect("insert");
        }

        let since = format_timestamp(ts("2025-01-01T02:00:00Z"));
        let diapers = db
            .list_events(
                "b1",
                EventQuery {
                    kind: Some("diaper"),
                    since: Some(&since),
                    limit: None,
                },
            )
            .expect("list");
        let ids: Vec<&str> = diapers.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let latest = db
            .list_events(
                "b1",
                EventQuery {
                    limit: Some(1),
                    ..EventQuery::default()
                },
            )
            .expect("list");
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, "d");
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let mut rec = record("e1", "b1", "2025-01-01T00:00:00Z", EventPayload::Sleep);
        assert!(!db.update_event(&rec).expect("update"));
        assert!(!db.delete_event("e1").expect("delete"));

        db.insert_event(&rec).expect("insert");
        rec.duration_secs = Some(3600);
        rec.notes = Some("long nap".to_string());
        assert!(db.update_event(&rec).expect("update"));
        assert_eq!(db.get_event("e1").expect("get"), Some(rec));

        assert!(db.delete_event("e1").expect("delete"));
        assert_eq!(db.get_event("e1").expect("get"), None);
    }
}
