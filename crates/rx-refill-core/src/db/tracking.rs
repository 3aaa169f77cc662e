//! Tracking event database operations (append-only).

use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::{TrackingEvent, TrackingStatus};

impl Database {
    /// Append a tracking event.
    pub fn insert_tracking_event(&self, event: &TrackingEvent) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO tracking_events (id, prescription_id, status, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                event.id,
                event.prescription_id,
                event.status.as_str(),
                event.notes,
                format_timestamp(&event.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Events for a prescription in insertion order.
    pub fn list_tracking_events(&self, prescription_id: &str) -> DbResult<Vec<TrackingEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, prescription_id, status, notes, created_at
            FROM tracking_events
            WHERE prescription_id = ?
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map([prescription_id], map_tracking_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?.try_into()?);
        }
        Ok(events)
    }

    /// Whether an event with `status` was recorded for a prescription.
    pub fn has_tracking_status(&self, prescription_id: &str, status: TrackingStatus) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracking_events WHERE prescription_id = ?1 AND status = ?2)",
            params![prescription_id, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

struct TrackingRow {
    id: String,
    prescription_id: String,
    status: String,
    notes: Option<String>,
    created_at: String,
}

fn map_tracking_row(row: &Row<'_>) -> rusqlite::Result<TrackingRow> {
    Ok(TrackingRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        status: row.get(2)?,
        notes: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl TryFrom<TrackingRow> for TrackingEvent {
    type Error = DbError;

    fn try_from(row: TrackingRow) -> Result<Self, Self::Error> {
        let status = TrackingStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown tracking status: {}", row.status)))?;

        Ok(TrackingEvent {
            id: row.id,
            prescription_id: row.prescription_id,
            status,
            timestamp: parse_timestamp(&row.created_at)?,
            notes: row.notes,
        })
    }
}
