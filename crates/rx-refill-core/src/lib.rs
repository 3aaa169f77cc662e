//! Rx-Refill Core Library
//!
//! Refill-request lifecycle, medicine fill quantities and prescription
//! tracking for a pharmacy ordering service.
//!
//! # Architecture
//!
//! ```text
//!  Patient uploads ──► Pharmacist review ──► APPROVED prescription
//!                                                   │
//!                                       create_refill_request (once, ever)
//!                                                   │
//!                                  PENDING ──► APPROVED ──► FILLED ──► DISPATCHED
//!                                     │                       │            │
//!                                     ▼                 Fill Calculator    ▼
//!                                  REJECTED            stock + reminder  patient marks
//!                                                                        DELIVERED
//!
//!  every step ──► tracking_events (append-only) ──► TrackingPublisher ──► live subscribers
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite storage
//! - [`models`]: Domain types (Prescription, RefillRequest, TrackingEvent, etc.)
//! - [`fill`]: Pure fill quantity calculator
//! - [`tracking`]: Timeline projection, publisher seam and live-feed policy
//! - [`lifecycle`]: The refill state machine
//! - [`reminders`]: Reminder scheduling and sweep
//! - [`notify`]: Patient notification seam

pub mod db;
pub mod fill;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod reminders;
pub mod tracking;

// Re-export commonly used types
pub use db::Database;
pub use fill::{plan_fill, FillPlan};
pub use lifecycle::{
    DeliveryOutcome, FillOutcome, RefillDetail, RefillError, RefillManager, RefillResult,
};
pub use models::{
    Actor, DeliveryAddress, FieldError, FillHistoryEntry, FillItemInput, FilledMedicine,
    InventoryItem, Prescription, PrescriptionStatus, RefillRequest, RefillStatus, ReminderSettings,
    ReminderStats, Role, TrackingEvent, TrackingStatus,
};
pub use notify::{LogNotifier, Notice, Notifier, NotifyError};
pub use reminders::{ReminderSweeper, SweepSummary};
pub use tracking::{NoopPublisher, TrackingProgress, TrackingPublisher};

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

/// Thread-safe handle to the refill system.
///
/// Cheap to clone; every clone shares one database connection.
#[derive(Clone)]
pub struct RefillCore {
    db: Arc<Mutex<Database>>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn TrackingPublisher>,
}

impl RefillCore {
    /// Wrap an open database, logging notifications and publishing nowhere.
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            notifier: Arc::new(LogNotifier),
            publisher: Arc::new(NoopPublisher),
        }
    }

    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> RefillResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> RefillResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn TrackingPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    fn with_manager<T>(&self, f: impl FnOnce(&RefillManager<'_>) -> RefillResult<T>) -> RefillResult<T> {
        let db = self.db.lock()?;
        let manager = RefillManager::new(&db, self.notifier.as_ref(), self.publisher.as_ref());
        f(&manager)
    }

    // =========================================================================
    // Prescriptions
    // =========================================================================

    pub fn register_prescription(&self, actor: &Actor, image_url: Option<String>) -> RefillResult<Prescription> {
        self.with_manager(|m| m.register_prescription(actor, image_url))
    }

    pub fn review_prescription(
        &self,
        actor: &Actor,
        prescription_id: &str,
        status: PrescriptionStatus,
        notes: Option<&str>,
    ) -> RefillResult<Prescription> {
        self.with_manager(|m| m.review_prescription(actor, prescription_id, status, notes))
    }

    pub fn fill_history(&self, actor: &Actor, prescription_id: &str) -> RefillResult<Vec<FillHistoryEntry>> {
        self.with_manager(|m| m.fill_history(actor, prescription_id))
    }

    // =========================================================================
    // Refill requests
    // =========================================================================

    pub fn create_refill_request(
        &self,
        actor: &Actor,
        prescription_id: &str,
        address: &DeliveryAddress,
    ) -> RefillResult<RefillRequest> {
        self.with_manager(|m| m.create_refill_request(actor, prescription_id, address))
    }

    pub fn approve(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        self.with_manager(|m| m.approve(actor, request_id))
    }

    pub fn reject(&self, actor: &Actor, request_id: &str, reason: Option<&str>) -> RefillResult<RefillRequest> {
        self.with_manager(|m| m.reject(actor, request_id, reason))
    }

    pub fn fill(
        &self,
        actor: &Actor,
        request_id: &str,
        items: &[FillItemInput],
        enable_reminders: bool,
    ) -> RefillResult<FillOutcome> {
        self.with_manager(|m| m.fill(actor, request_id, items, enable_reminders))
    }

    pub fn dispatch(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        self.with_manager(|m| m.dispatch(actor, request_id))
    }

    pub fn get_refill_request(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        self.with_manager(|m| m.get_refill_request(actor, request_id))
    }

    pub fn list_refill_requests(
        &self,
        actor: &Actor,
        status: Option<RefillStatus>,
    ) -> RefillResult<Vec<RefillRequest>> {
        self.with_manager(|m| m.list_refill_requests(actor, status))
    }

    pub fn refill_detail(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillDetail> {
        self.with_manager(|m| m.refill_detail(actor, request_id))
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    pub fn tracking_history(&self, actor: &Actor, prescription_id: &str) -> RefillResult<Vec<TrackingEvent>> {
        self.with_manager(|m| m.tracking_history(actor, prescription_id))
    }

    pub fn tracking_progress(&self, actor: &Actor, prescription_id: &str) -> RefillResult<TrackingProgress> {
        self.with_manager(|m| m.tracking_progress(actor, prescription_id))
    }

    pub fn record_tracking(
        &self,
        actor: &Actor,
        prescription_id: &str,
        status: TrackingStatus,
        notes: Option<String>,
    ) -> RefillResult<TrackingEvent> {
        self.with_manager(|m| m.record_tracking(actor, prescription_id, status, notes))
    }

    pub fn mark_delivered(&self, actor: &Actor, prescription_id: &str) -> RefillResult<DeliveryOutcome> {
        self.with_manager(|m| m.mark_delivered(actor, prescription_id))
    }

    // =========================================================================
    // Inventory & reminders
    // =========================================================================

    pub fn upsert_inventory(&self, actor: &Actor, item: &InventoryItem) -> RefillResult<()> {
        self.with_manager(|m| m.upsert_inventory(actor, item))
    }

    pub fn list_inventory(&self, actor: &Actor) -> RefillResult<Vec<InventoryItem>> {
        self.with_manager(|m| m.list_inventory(actor))
    }

    /// Send every reminder due on or before `today`.
    pub fn run_reminder_sweep(&self, today: NaiveDate) -> RefillResult<SweepSummary> {
        let db = self.db.lock()?;
        Ok(ReminderSweeper::new(&db, self.notifier.as_ref()).run(today)?)
    }

    /// Sweep on demand. Admin only.
    pub fn trigger_reminder_sweep(&self, actor: &Actor, today: NaiveDate) -> RefillResult<SweepSummary> {
        lifecycle::require_admin(actor, "trigger reminder sweeps")?;
        tracing::info!(triggered_by = %actor.user_id, %today, "manual reminder sweep");
        self.run_reminder_sweep(today)
    }

    pub fn set_reminders_enabled(
        &self,
        actor: &Actor,
        patient_id: &str,
        enabled: bool,
    ) -> RefillResult<ReminderSettings> {
        self.with_manager(|m| m.set_reminders_enabled(actor, patient_id, enabled))
    }

    pub fn reminder_stats(&self, actor: &Actor, today: NaiveDate) -> RefillResult<ReminderStats> {
        self.with_manager(|m| m.reminder_stats(actor, today))
    }
}
