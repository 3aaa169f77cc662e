//! Refill lifecycle manager.
//!
//! ```text
//! register ─► review(APPROVED) ─► create_refill_request ─► approve ─► fill ─► dispatch ─► mark_delivered
//!                                                      └─► reject
//! ```
//!
//! Patients may also switch their refill reminders off and on; admins see
//! reminder counts.
//!
//! Every state change runs in one SQLite transaction and updates rows with a
//! compare-and-set on the expected status, so two racing pharmacists cannot
//! both win. Tracking events are published and patients notified only after
//! the transaction commits.

mod prescriptions;
mod queries;
mod reminders;
mod requests;
mod tracking;

pub use queries::RefillDetail;
pub use requests::FillOutcome;
pub use tracking::DeliveryOutcome;

use std::sync::PoisonError;

use thiserror::Error;

use crate::db::{Database, DbError, RefillTransition};
use crate::fill::FillError;
use crate::models::{
    Actor, FieldError, Prescription, RefillRequest, RefillStatus, Role, TrackingEvent,
};
use crate::notify::Notifier;
use crate::tracking::TrackingPublisher;

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum RefillError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("No eligible medicines to fill")]
    NothingToFill,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RefillResult<T> = Result<T, RefillError>;

impl From<DbError> for RefillError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Duplicate(what) => RefillError::DuplicateRequest(what),
            DbError::NotFound(what) => RefillError::NotFound(what),
            other => RefillError::Database(other),
        }
    }
}

impl From<FillError> for RefillError {
    fn from(e: FillError) -> Self {
        match e {
            FillError::Database(db) => db.into(),
            FillError::UnknownMedicine(id) => RefillError::NotFound(format!("Medicine {}", id)),
            FillError::NothingToFill => RefillError::NothingToFill,
        }
    }
}

impl<T> From<PoisonError<T>> for RefillError {
    fn from(e: PoisonError<T>) -> Self {
        RefillError::Internal(format!("Lock poisoned: {}", e))
    }
}

/// Coordinates storage, notifications and live tracking for one call.
pub struct RefillManager<'a> {
    db: &'a Database,
    notifier: &'a dyn Notifier,
    publisher: &'a dyn TrackingPublisher,
}

impl<'a> RefillManager<'a> {
    pub fn new(
        db: &'a Database,
        notifier: &'a dyn Notifier,
        publisher: &'a dyn TrackingPublisher,
    ) -> Self {
        Self {
            db,
            notifier,
            publisher,
        }
    }

    fn require_prescription(&self, id: &str) -> RefillResult<Prescription> {
        self.db
            .get_prescription(id)?
            .ok_or_else(|| RefillError::NotFound(format!("Prescription {}", id)))
    }

    fn require_request(&self, id: &str) -> RefillResult<RefillRequest> {
        self.db
            .get_refill_request(id)?
            .ok_or_else(|| RefillError::NotFound(format!("Refill request {}", id)))
    }

    /// Fail unless `request` may move to `to`.
    fn check_transition(request: &RefillRequest, to: RefillStatus) -> RefillResult<()> {
        if request.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(RefillError::InvalidTransition(format!(
                "Refill request {} cannot move from {} to {}",
                request.id,
                request.status.as_str(),
                to.as_str()
            )))
        }
    }

    /// Compare-and-set a status change, returning the updated request.
    fn apply_transition(&self, id: &str, transition: &RefillTransition<'_>) -> RefillResult<RefillRequest> {
        if !self.db.transition_refill_request(id, transition)? {
            return Err(RefillError::InvalidTransition(format!(
                "Refill request {} is no longer {}",
                id,
                transition.from.as_str()
            )));
        }
        self.require_request(id)
    }

    fn record_events(&self, events: &[TrackingEvent]) -> RefillResult<()> {
        for event in events {
            self.db.insert_tracking_event(event)?;
        }
        Ok(())
    }

    fn publish(&self, events: &[TrackingEvent]) {
        for event in events {
            self.publisher.publish(event);
        }
    }
}

fn forbidden(actor: &Actor, action: &str) -> RefillError {
    RefillError::Forbidden(format!("{} may not {}", actor.role.as_str(), action))
}

/// Approve and reject are pharmacist decisions.
fn require_pharmacist(actor: &Actor, action: &str) -> RefillResult<()> {
    if actor.role == Role::Pharmacist {
        Ok(())
    } else {
        Err(forbidden(actor, action))
    }
}

fn require_staff(actor: &Actor, action: &str) -> RefillResult<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(forbidden(actor, action))
    }
}

pub(crate) fn require_admin(actor: &Actor, action: &str) -> RefillResult<()> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(forbidden(actor, action))
    }
}

/// Staff see everything; patients only their own prescriptions.
fn require_viewer(actor: &Actor, prescription: &Prescription) -> RefillResult<()> {
    if actor.is_staff() || prescription.patient_id == actor.user_id {
        Ok(())
    } else {
        Err(forbidden(actor, "view another patient's prescription"))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use crate::db::Database;
    use crate::models::{
        Actor, DeliveryAddress, InventoryItem, Prescription, PrescriptionStatus, TrackingEvent,
    };
    use crate::notify::{Notice, Notifier, NotifyError};
    use crate::tracking::TrackingPublisher;

    #[derive(Default)]
    pub struct Recorder {
        pub notices: Mutex<Vec<Notice>>,
        pub events: Mutex<Vec<TrackingEvent>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
            self.notices.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    impl TrackingPublisher for Recorder {
        fn publish(&self, event: &TrackingEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    pub fn patient() -> Actor {
        Actor::patient("patient-1")
    }

    pub fn pharmacist() -> Actor {
        Actor::pharmacist("pharm-1")
    }

    pub fn address() -> DeliveryAddress {
        DeliveryAddress {
            line1: "12 MG Road".into(),
            line2: None,
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
            phone: "9876543210".into(),
        }
    }

    /// Database with one approved prescription and two stocked medicines.
    pub fn seeded() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let mut prescription = Prescription::new("patient-1".into(), None);
        prescription.status = PrescriptionStatus::Approved;
        db.insert_prescription(&prescription).unwrap();
        db.upsert_inventory_item(&InventoryItem::new("MED-1".into(), "Metformin 500mg".into(), 100))
            .unwrap();
        db.upsert_inventory_item(&InventoryItem::new("MED-2".into(), "Atorvastatin 10mg".into(), 5))
            .unwrap();
        (db, prescription.id)
    }
}
