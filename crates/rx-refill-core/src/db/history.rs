//! Fill history and refill reminder database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    format_timestamp, parse_date, parse_optional_timestamp, parse_timestamp, Database, DbError,
    DbResult,
};
use crate::models::{
    FillHistoryEntry, FillHistoryStatus, FilledMedicine, RefillReminder, ReminderStats,
};

const HISTORY_COLUMNS: &str = r#"
    id, refill_request_id, prescription_id, patient_id, pharmacist_id,
    medicines, status, fill_date, refill_reminder_date
"#;

const REMINDER_COLUMNS: &str = r#"
    id, prescription_id, patient_id, days_until_refill, reminder_date,
    enabled, sent, sent_at, created_at
"#;

impl Database {
    // ========================================================================
    // Fill history
    // ========================================================================

    /// Insert a fill history entry.
    pub fn insert_fill_history(&self, entry: &FillHistoryEntry) -> DbResult<()> {
        let medicines_json = serde_json::to_string(&entry.medicines)?;

        self.conn.execute(
            r#"
            INSERT INTO fill_history (
                id, refill_request_id, prescription_id, patient_id, pharmacist_id,
                medicines, status, fill_date, refill_reminder_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entry.id,
                entry.refill_request_id,
                entry.prescription_id,
                entry.patient_id,
                entry.pharmacist_id,
                medicines_json,
                history_status_to_string(&entry.status),
                format_timestamp(&entry.fill_date),
                entry.refill_reminder_date.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Fill history for a prescription, newest first.
    pub fn list_fill_history(&self, prescription_id: &str) -> DbResult<Vec<FillHistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM fill_history WHERE prescription_id = ? ORDER BY fill_date DESC",
            HISTORY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([prescription_id], map_history_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Most recent fill for a prescription.
    pub fn latest_fill(&self, prescription_id: &str) -> DbResult<Option<FillHistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM fill_history WHERE prescription_id = ? ORDER BY fill_date DESC LIMIT 1",
            HISTORY_COLUMNS
        );
        self.conn
            .query_row(&sql, [prescription_id], map_history_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Mark every FILLED entry of a prescription as DISPATCHED.
    ///
    /// Returns the number of entries updated.
    pub fn mark_fill_history_dispatched(&self, prescription_id: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "UPDATE fill_history SET status = 'DISPATCHED' WHERE prescription_id = ? AND status = 'FILLED'",
            [prescription_id],
        )?;
        Ok(rows_affected)
    }

    // ========================================================================
    // Reminders
    // ========================================================================

    /// Insert a refill reminder.
    pub fn insert_reminder(&self, reminder: &RefillReminder) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO refill_reminders (
                id, prescription_id, patient_id, days_until_refill, reminder_date,
                enabled, sent, sent_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                reminder.id,
                reminder.prescription_id,
                reminder.patient_id,
                reminder.days_until_refill,
                reminder.reminder_date.to_string(),
                reminder.enabled,
                reminder.sent,
                reminder.sent_at.as_ref().map(format_timestamp),
                format_timestamp(&reminder.created_at),
            ],
        )?;
        Ok(())
    }

    /// Enabled, unsent reminders dated on or before `today`, oldest first.
    pub fn list_due_reminders(&self, today: NaiveDate) -> DbResult<Vec<RefillReminder>> {
        let sql = format!(
            r#"
            SELECT {} FROM refill_reminders
            WHERE enabled = 1 AND sent = 0 AND reminder_date <= ?
            ORDER BY reminder_date, created_at
            "#,
            REMINDER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([today.to_string()], map_reminder_row)?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?.try_into()?);
        }
        Ok(reminders)
    }

    /// All reminders for a prescription, oldest first.
    pub fn list_reminders(&self, prescription_id: &str) -> DbResult<Vec<RefillReminder>> {
        let sql = format!(
            "SELECT {} FROM refill_reminders WHERE prescription_id = ? ORDER BY created_at",
            REMINDER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([prescription_id], map_reminder_row)?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?.try_into()?);
        }
        Ok(reminders)
    }

    /// Mark a reminder as sent.
    pub fn mark_reminder_sent(&self, id: &str, sent_at: &DateTime<Utc>) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            "UPDATE refill_reminders SET sent = 1, sent_at = ?2 WHERE id = ?1",
            params![id, format_timestamp(sent_at)],
        )?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("Reminder {}", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Reminder settings
    // ========================================================================

    /// Whether a patient receives reminders. On unless turned off.
    pub fn patient_reminders_enabled(&self, patient_id: &str) -> DbResult<bool> {
        let enabled: Option<bool> = self
            .conn
            .query_row(
                "SELECT enabled FROM reminder_settings WHERE patient_id = ?",
                [patient_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(enabled.unwrap_or(true))
    }

    /// Store a patient's choice and apply it to their unsent reminders.
    ///
    /// Returns how many reminders changed.
    pub fn set_patient_reminders_enabled(
        &self,
        patient_id: &str,
        enabled: bool,
        updated_at: &DateTime<Utc>,
    ) -> DbResult<usize> {
        self.conn.execute(
            r#"
            INSERT INTO reminder_settings (patient_id, enabled, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(patient_id) DO UPDATE SET
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
            params![patient_id, enabled, format_timestamp(updated_at)],
        )?;

        let changed = self.conn.execute(
            "UPDATE refill_reminders SET enabled = ?2 WHERE patient_id = ?1 AND sent = 0 AND enabled <> ?2",
            params![patient_id, enabled],
        )?;
        Ok(changed)
    }

    /// Reminder counts as of `today`.
    pub fn reminder_stats(&self, today: NaiveDate) -> DbResult<ReminderStats> {
        let tomorrow = today.succ_opt().unwrap_or(today);
        let day_start = format!("{}T00:00:00", today);
        let next_day_start = format!("{}T00:00:00", tomorrow);

        let (total, enabled, due_today, sent_today): (i64, i64, i64, i64) = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(enabled), 0),
                COALESCE(SUM(CASE WHEN enabled = 1 AND sent = 0 AND reminder_date = ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sent_at >= ?2 AND sent_at < ?3 THEN 1 ELSE 0 END), 0)
            FROM refill_reminders
            "#,
            params![today.to_string(), day_start, next_day_start],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(ReminderStats {
            total_reminders: total as usize,
            enabled_reminders: enabled as usize,
            due_today: due_today as usize,
            sent_today: sent_today as usize,
        })
    }
}

struct HistoryRow {
    id: String,
    refill_request_id: String,
    prescription_id: String,
    patient_id: String,
    pharmacist_id: String,
    medicines: String,
    status: String,
    fill_date: String,
    refill_reminder_date: Option<String>,
}

fn map_history_row(row: &Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        refill_request_id: row.get(1)?,
        prescription_id: row.get(2)?,
        patient_id: row.get(3)?,
        pharmacist_id: row.get(4)?,
        medicines: row.get(5)?,
        status: row.get(6)?,
        fill_date: row.get(7)?,
        refill_reminder_date: row.get(8)?,
    })
}

impl TryFrom<HistoryRow> for FillHistoryEntry {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let medicines: Vec<FilledMedicine> = serde_json::from_str(&row.medicines)?;

        Ok(FillHistoryEntry {
            id: row.id,
            refill_request_id: row.refill_request_id,
            prescription_id: row.prescription_id,
            patient_id: row.patient_id,
            pharmacist_id: row.pharmacist_id,
            medicines,
            status: string_to_history_status(&row.status)?,
            fill_date: parse_timestamp(&row.fill_date)?,
            refill_reminder_date: row.refill_reminder_date.as_deref().map(parse_date).transpose()?,
        })
    }
}

struct ReminderRow {
    id: String,
    prescription_id: String,
    patient_id: String,
    days_until_refill: u32,
    reminder_date: String,
    enabled: bool,
    sent: bool,
    sent_at: Option<String>,
    created_at: String,
}

fn map_reminder_row(row: &Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        patient_id: row.get(2)?,
        days_until_refill: row.get(3)?,
        reminder_date: row.get(4)?,
        enabled: row.get(5)?,
        sent: row.get(6)?,
        sent_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<ReminderRow> for RefillReminder {
    type Error = DbError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        Ok(RefillReminder {
            id: row.id,
            prescription_id: row.prescription_id,
            patient_id: row.patient_id,
            days_until_refill: row.days_until_refill,
            reminder_date: parse_date(&row.reminder_date)?,
            enabled: row.enabled,
            sent: row.sent,
            sent_at: parse_optional_timestamp(row.sent_at)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

fn history_status_to_string(status: &FillHistoryStatus) -> &'static str {
    match status {
        FillHistoryStatus::Filled => "FILLED",
        FillHistoryStatus::Dispatched => "DISPATCHED",
    }
}

fn string_to_history_status(s: &str) -> Result<FillHistoryStatus, DbError> {
    match s {
        "FILLED" => Ok(FillHistoryStatus::Filled),
        "DISPATCHED" => Ok(FillHistoryStatus::Dispatched),
        _ => Err(DbError::Constraint(format!("Unknown fill history status: {}", s))),
    }
}
