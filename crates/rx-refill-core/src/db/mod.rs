//! Database layer for rx-refill.

mod schema;
mod prescriptions;
mod refills;
mod inventory;
mod history;
mod tracking;

pub use schema::*;
#[allow(unused_imports)]
pub use prescriptions::*;
#[allow(unused_imports)]
pub use refills::*;
#[allow(unused_imports)]
pub use inventory::*;
#[allow(unused_imports)]
pub use history::*;
#[allow(unused_imports)]
pub use tracking::*;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{ffi, Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction, rolling back if it returns an error.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Database) -> Result<T, E>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DbError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Invalid timestamp {}: {}", value, e)))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_date(value: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| DbError::Constraint(format!("Invalid date {}: {}", value, e)))
}

/// Whether an error is a UNIQUE/PRIMARY KEY violation.
///
/// Foreign key, CHECK and trigger aborts share the primary constraint code,
/// so only the extended code tells them apart.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
