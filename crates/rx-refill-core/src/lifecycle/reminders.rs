//! Patient reminder settings and admin reminder statistics.

use chrono::{NaiveDate, Utc};

use super::{forbidden, require_admin, RefillError, RefillManager, RefillResult};
use crate::models::{Actor, FieldError, ReminderSettings, ReminderStats, Role};

impl<'a> RefillManager<'a> {
    /// Turn refill reminders on or off for a patient.
    ///
    /// Applies to the patient's unsent reminders and to every reminder
    /// scheduled afterwards. Patients change their own setting; admins may
    /// change anyone's.
    pub fn set_reminders_enabled(
        &self,
        actor: &Actor,
        patient_id: &str,
        enabled: bool,
    ) -> RefillResult<ReminderSettings> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(RefillError::Validation(vec![FieldError::new(
                "patientId",
                "Patient is required",
            )]));
        }

        let own = actor.role == Role::Patient && actor.user_id == patient_id;
        if !own && actor.role != Role::Admin {
            return Err(forbidden(actor, "change another patient's reminder settings"));
        }

        let reminders_updated =
            self.db
                .set_patient_reminders_enabled(patient_id, enabled, &Utc::now())?;

        tracing::info!(
            patient_id,
            enabled,
            reminders_updated,
            changed_by = %actor.user_id,
            "reminder settings updated"
        );
        Ok(ReminderSettings {
            patient_id: patient_id.to_string(),
            enabled,
            reminders_updated,
        })
    }

    /// Reminder counts as of `today`. Admin only.
    pub fn reminder_stats(&self, actor: &Actor, today: NaiveDate) -> RefillResult<ReminderStats> {
        require_admin(actor, "view reminder statistics")?;
        Ok(self.db.reminder_stats(today)?)
    }
}
