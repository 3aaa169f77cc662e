//! Prescription database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_optional_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::{Prescription, PrescriptionStatus};

const PRESCRIPTION_COLUMNS: &str =
    "id, patient_id, image_url, status, review_notes, uploaded_at, reviewed_at";

impl Database {
    /// Insert a new prescription.
    pub fn insert_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                id, patient_id, image_url, status, review_notes, uploaded_at, reviewed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                prescription.id,
                prescription.patient_id,
                prescription.image_url,
                status_to_string(&prescription.status),
                prescription.review_notes,
                format_timestamp(&prescription.uploaded_at),
                prescription.reviewed_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    /// Get a prescription by ID.
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        let sql = format!("SELECT {} FROM prescriptions WHERE id = ?", PRESCRIPTION_COLUMNS);
        self.conn
            .query_row(&sql, [id], map_prescription_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Record a review outcome if the prescription is still in `expected` status.
    ///
    /// Returns `false` when another review got there first.
    pub fn update_prescription_review(
        &self,
        id: &str,
        expected: &PrescriptionStatus,
        status: &PrescriptionStatus,
        notes: Option<&str>,
        reviewed_at: &DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE prescriptions SET
                status = ?3,
                review_notes = ?4,
                reviewed_at = ?5
            WHERE id = ?1 AND status = ?2
            "#,
            params![
                id,
                status_to_string(expected),
                status_to_string(status),
                notes,
                format_timestamp(reviewed_at),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// List a patient's prescriptions, newest first.
    pub fn list_prescriptions_for_patient(&self, patient_id: &str) -> DbResult<Vec<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE patient_id = ? ORDER BY uploaded_at DESC",
            PRESCRIPTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([patient_id], map_prescription_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    patient_id: String,
    image_url: Option<String>,
    status: String,
    review_notes: Option<String>,
    uploaded_at: String,
    reviewed_at: Option<String>,
}

fn map_prescription_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        image_url: row.get(2)?,
        status: row.get(3)?,
        review_notes: row.get(4)?,
        uploaded_at: row.get(5)?,
        reviewed_at: row.get(6)?,
    })
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        Ok(Prescription {
            id: row.id,
            patient_id: row.patient_id,
            image_url: row.image_url,
            status: string_to_status(&row.status)?,
            review_notes: row.review_notes,
            uploaded_at: parse_timestamp(&row.uploaded_at)?,
            reviewed_at: parse_optional_timestamp(row.reviewed_at)?,
        })
    }
}

fn status_to_string(status: &PrescriptionStatus) -> &'static str {
    match status {
        PrescriptionStatus::Pending => "PENDING",
        PrescriptionStatus::Approved => "APPROVED",
        PrescriptionStatus::Rejected => "REJECTED",
        PrescriptionStatus::RequiresClarification => "REQUIRES_CLARIFICATION",
    }
}

fn string_to_status(s: &str) -> Result<PrescriptionStatus, DbError> {
    match s {
        "PENDING" => Ok(PrescriptionStatus::Pending),
        "APPROVED" => Ok(PrescriptionStatus::Approved),
        "REJECTED" => Ok(PrescriptionStatus::Rejected),
        "REQUIRES_CLARIFICATION" => Ok(PrescriptionStatus::RequiresClarification),
        _ => Err(DbError::Constraint(format!("Unknown prescription status: {}", s))),
    }
}
