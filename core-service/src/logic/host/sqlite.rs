//! SQLite History - recorder-style `states` table
//!
//! Schema: `states(entity_id TEXT, state TEXT, last_changed_ts REAL)`,
//! timestamps in fractional UNIX seconds.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{HistoryEvent, HistoryMap, HistoryProvider, HostState};
use crate::logic::error::HistoryError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS states (
        entity_id TEXT NOT NULL,
        state TEXT NOT NULL,
        last_changed_ts REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS ix_states_entity_ts ON states (entity_id, last_changed_ts);
";

pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("[History] Opened SQLite history at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append one state transition
    pub fn record(&self, entity_id: &str, state: &str, at: DateTime<Utc>) -> Result<(), HistoryError> {
        self.conn.lock().execute(
            "INSERT INTO states (entity_id, state, last_changed_ts) VALUES (?1, ?2, ?3)",
            params![entity_id, state, to_ts(at)],
        )?;
        Ok(())
    }

    /// Most recent recorded state per entity, for seeding a state table
    pub fn latest_states(&self, entity_ids: &[String]) -> Result<HashMap<String, HostState>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT state, last_changed_ts FROM states
             WHERE entity_id = ?1 ORDER BY last_changed_ts DESC LIMIT 1",
        )?;

        let mut out = HashMap::new();
        for id in entity_ids {
            let row: Option<(String, f64)> = stmt
                .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            if let Some((state, ts)) = row {
                out.insert(id.clone(), HostState::new(state, from_ts(ts)?));
            }
        }
        Ok(out)
    }
}

impl HistoryProvider for SqliteHistory {
    fn query_history(
        &self,
        entity_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryMap, HistoryError> {
        let conn = self.conn.lock();
        let mut opening_stmt = conn.prepare(
            "SELECT state, last_changed_ts FROM states
             WHERE entity_id = ?1 AND last_changed_ts <= ?2
             ORDER BY last_changed_ts DESC LIMIT 1",
        )?;
        let mut window_stmt = conn.prepare(
            "SELECT state, last_changed_ts FROM states
             WHERE entity_id = ?1 AND last_changed_ts > ?2 AND last_changed_ts <= ?3
             ORDER BY last_changed_ts ASC",
        )?;

        let (start_ts, end_ts) = (to_ts(start), to_ts(end));
        let mut out = HistoryMap::new();

        for id in entity_ids {
            let mut events = Vec::new();

            let opening: Option<(String, f64)> = opening_stmt
                .query_row(params![id, start_ts], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            if let Some((state, ts)) = opening {
                events.push(HistoryEvent::new(state, from_ts(ts)?));
            }

            let rows = window_stmt.query_map(params![id, start_ts, end_ts], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            for row in rows {
                let (state, ts) = row?;
                events.push(HistoryEvent::new(state, from_ts(ts)?));
            }

            if !events.is_empty() {
                out.insert(id.clone(), events);
            }
        }

        log::debug!(
            "[History] Query {} entities -> {} with data",
            entity_ids.len(),
            out.len()
        );
        Ok(out)
    }
}

fn to_ts(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

fn from_ts(ts: f64) -> Result<DateTime<Utc>, HistoryError> {
    if !ts.is_finite() {
        return Err(HistoryError::Query(format!("invalid timestamp {ts}")));
    }
    DateTime::from_timestamp_micros((ts * 1_000_000.0).round() as i64)
        .ok_or_else(|| HistoryError::Query(format!("timestamp out of range {ts}")))
}
