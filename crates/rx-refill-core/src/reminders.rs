//! Refill reminder scheduling and the daily sweep.

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use crate::db::{Database, DbResult};
use crate::models::REMINDER_LEAD_DAYS;
use crate::notify::{deliver, Notice, Notifier};

/// Shortest supply that earns a reminder.
pub const MIN_REMINDER_SUPPLY_DAYS: u32 = 7;

/// Date to remind the patient, `REMINDER_LEAD_DAYS` before the supply ends.
///
/// `None` when reminders are off or the supply is under a week.
pub fn reminder_date(fill_date: NaiveDate, max_days: u32, enabled: bool) -> Option<NaiveDate> {
    if !enabled || max_days < MIN_REMINDER_SUPPLY_DAYS {
        return None;
    }
    let offset = u64::from(max_days).saturating_sub(REMINDER_LEAD_DAYS);
    fill_date.checked_add_days(Days::new(offset))
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub checked: usize,
    pub sent: usize,
    /// Patient already has a pending refill request
    pub skipped: usize,
    pub failed: usize,
}

/// Sends due reminders.
pub struct ReminderSweeper<'a> {
    db: &'a Database,
    notifier: &'a dyn Notifier,
}

impl<'a> ReminderSweeper<'a> {
    pub fn new(db: &'a Database, notifier: &'a dyn Notifier) -> Self {
        Self { db, notifier }
    }

    /// Process every enabled, unsent reminder due on or before `today`.
    ///
    /// A reminder is marked sent only when the notifier accepts it, so a
    /// failed delivery is retried on the next sweep.
    pub fn run(&self, today: NaiveDate) -> DbResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        for reminder in self.db.list_due_reminders(today)? {
            summary.checked += 1;

            if self
                .db
                .has_pending_refill_request(&reminder.prescription_id, &reminder.patient_id)?
            {
                tracing::debug!(
                    reminder_id = %reminder.id,
                    prescription_id = %reminder.prescription_id,
                    "refill already pending; reminder skipped"
                );
                summary.skipped += 1;
                continue;
            }

            let medicine_summary = self
                .db
                .latest_fill(&reminder.prescription_id)?
                .map(|fill| fill.medicine_summary())
                .unwrap_or_default();

            let notice = Notice::RefillDue {
                patient_id: reminder.patient_id.clone(),
                prescription_id: reminder.prescription_id.clone(),
                medicine_summary,
                due_date: reminder.refill_due_date(),
            };

            if deliver(self.notifier, &notice) {
                self.db.mark_reminder_sent(&reminder.id, &Utc::now())?;
                summary.sent += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            %today,
            checked = summary.checked,
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            "reminder sweep finished"
        );
        Ok(summary)
    }
}
