//! Refill request database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{
    format_timestamp, is_unique_violation, parse_optional_timestamp, parse_timestamp, Database,
    DbError, DbResult,
};
use crate::models::{DeliveryAddress, RefillRequest, RefillStatus};

const REFILL_COLUMNS: &str = r#"
    id, prescription_id, patient_id, pharmacist_id,
    address_line1, address_line2, city, state, pincode, phone,
    status, requested_at, actioned_at, rejection_reason
"#;

/// A compare-and-set status change on a refill request.
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone)]
pub struct RefillTransition<'a> {
    pub from: RefillStatus,
    pub to: RefillStatus,
    pub pharmacist_id: Option<&'a str>,
    pub actioned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<&'a str>,
}

impl<'a> RefillTransition<'a> {
    pub fn new(from: RefillStatus, to: RefillStatus) -> Self {
        Self {
            from,
            to,
            pharmacist_id: None,
            actioned_at: None,
            rejection_reason: None,
        }
    }
}

impl Database {
    /// Insert a new refill request.
    ///
    /// Fails with [`DbError::Duplicate`] if the prescription already has one.
    pub fn insert_refill_request(&self, request: &RefillRequest) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO refill_requests (
                id, prescription_id, patient_id, pharmacist_id,
                address_line1, address_line2, city, state, pincode, phone,
                status, requested_at, actioned_at, rejection_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                request.id,
                request.prescription_id,
                request.patient_id,
                request.pharmacist_id,
                request.address.line1,
                request.address.line2,
                request.address.city,
                request.address.state,
                request.address.pincode,
                request.address.phone,
                request.status.as_str(),
                format_timestamp(&request.requested_at),
                request.actioned_at.as_ref().map(format_timestamp),
                request.rejection_reason,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DbError::Duplicate(format!(
                "refill request for prescription {}",
                request.prescription_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a refill request by ID.
    pub fn get_refill_request(&self, id: &str) -> DbResult<Option<RefillRequest>> {
        let sql = format!("SELECT {} FROM refill_requests WHERE id = ?", REFILL_COLUMNS);
        self.conn
            .query_row(&sql, [id], map_refill_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get the refill request for a prescription, if one was ever made.
    pub fn get_refill_request_for_prescription(
        &self,
        prescription_id: &str,
    ) -> DbResult<Option<RefillRequest>> {
        let sql = format!(
            "SELECT {} FROM refill_requests WHERE prescription_id = ?",
            REFILL_COLUMNS
        );
        self.conn
            .query_row(&sql, [prescription_id], map_refill_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Whether any refill request exists for a prescription, regardless of status.
    pub fn refill_request_exists(&self, prescription_id: &str) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM refill_requests WHERE prescription_id = ?)",
            [prescription_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether the patient has a pending refill request for a prescription.
    pub fn has_pending_refill_request(&self, prescription_id: &str, patient_id: &str) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM refill_requests
                WHERE prescription_id = ?1 AND patient_id = ?2 AND status = 'PENDING'
            )
            "#,
            params![prescription_id, patient_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Apply a status transition if the request is still in `transition.from`.
    ///
    /// Returns `false` when the stored status no longer matches, i.e. a
    /// concurrent transition won.
    pub fn transition_refill_request(&self, id: &str, transition: &RefillTransition<'_>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE refill_requests SET
                status = ?3,
                pharmacist_id = COALESCE(?4, pharmacist_id),
                actioned_at = COALESCE(?5, actioned_at),
                rejection_reason = COALESCE(?6, rejection_reason)
            WHERE id = ?1 AND status = ?2
            "#,
            params![
                id,
                transition.from.as_str(),
                transition.to.as_str(),
                transition.pharmacist_id,
                transition.actioned_at.as_ref().map(format_timestamp),
                transition.rejection_reason,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// List a patient's refill requests, newest first.
    pub fn list_refill_requests_for_patient(&self, patient_id: &str) -> DbResult<Vec<RefillRequest>> {
        let sql = format!(
            "SELECT {} FROM refill_requests WHERE patient_id = ? ORDER BY requested_at DESC",
            REFILL_COLUMNS
        );
        self.query_refill_requests(&sql, patient_id)
    }

    /// List refill requests by status, newest first.
    pub fn list_refill_requests_by_status(&self, status: &RefillStatus) -> DbResult<Vec<RefillRequest>> {
        let sql = format!(
            "SELECT {} FROM refill_requests WHERE status = ? ORDER BY requested_at DESC",
            REFILL_COLUMNS
        );
        self.query_refill_requests(&sql, status.as_str())
    }

    fn query_refill_requests(&self, sql: &str, param: &str) -> DbResult<Vec<RefillRequest>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([param], map_refill_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }
}

/// Intermediate row struct for database mapping.
struct RefillRow {
    id: String,
    prescription_id: String,
    patient_id: String,
    pharmacist_id: Option<String>,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    pincode: String,
    phone: String,
    status: String,
    requested_at: String,
    actioned_at: Option<String>,
    rejection_reason: Option<String>,
}

fn map_refill_row(row: &Row<'_>) -> rusqlite::Result<RefillRow> {
    Ok(RefillRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        patient_id: row.get(2)?,
        pharmacist_id: row.get(3)?,
        address_line1: row.get(4)?,
        address_line2: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        pincode: row.get(8)?,
        phone: row.get(9)?,
        status: row.get(10)?,
        requested_at: row.get(11)?,
        actioned_at: row.get(12)?,
        rejection_reason: row.get(13)?,
    })
}

impl TryFrom<RefillRow> for RefillRequest {
    type Error = DbError;

    fn try_from(row: RefillRow) -> Result<Self, Self::Error> {
        let status = RefillStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown refill status: {}", row.status)))?;

        Ok(RefillRequest {
            id: row.id,
            prescription_id: row.prescription_id,
            patient_id: row.patient_id,
            pharmacist_id: row.pharmacist_id,
            address: DeliveryAddress {
                line1: row.address_line1,
                line2: row.address_line2,
                city: row.city,
                state: row.state,
                pincode: row.pincode,
                phone: row.phone,
            },
            status,
            requested_at: parse_timestamp(&row.requested_at)?,
            actioned_at: parse_optional_timestamp(row.actioned_at)?,
            rejection_reason: row.rejection_reason,
        })
    }
}
