//! Patient notifications.
//!
//! Delivery (email, SMS, push) lives outside this crate. The lifecycle only
//! hands over a [`Notice`]; a failed delivery is logged and never rolls
//! back the transition that produced it.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Something the patient should hear about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    /// Medicines counted out and ready to dispatch
    #[serde(rename_all = "camelCase")]
    MedicinesFilled {
        patient_id: String,
        prescription_id: String,
        /// `- Name (xN)` lines
        medicine_summary: String,
        refill_reminder_date: Option<NaiveDate>,
    },
    #[serde(rename_all = "camelCase")]
    MedicinesDispatched {
        patient_id: String,
        prescription_id: String,
    },
    /// Current supply is about to run out
    #[serde(rename_all = "camelCase")]
    RefillDue {
        patient_id: String,
        prescription_id: String,
        medicine_summary: String,
        due_date: NaiveDate,
    },
}

impl Notice {
    pub fn patient_id(&self) -> &str {
        match self {
            Notice::MedicinesFilled { patient_id, .. }
            | Notice::MedicinesDispatched { patient_id, .. }
            | Notice::RefillDue { patient_id, .. } => patient_id,
        }
    }

    /// Short subject line.
    pub fn subject(&self) -> &'static str {
        match self {
            Notice::MedicinesFilled { .. } => "Your medicines have been filled",
            Notice::MedicinesDispatched { .. } => "Your medicines are on the way",
            Notice::RefillDue { .. } => "Time to refill your prescription",
        }
    }

    /// Plain-text body.
    pub fn body(&self) -> String {
        match self {
            Notice::MedicinesFilled {
                medicine_summary,
                refill_reminder_date,
                ..
            } => {
                let mut body = format!("Medicines filled:\n{}", medicine_summary);
                if let Some(date) = refill_reminder_date {
                    body.push_str(&format!("\n\nWe will remind you to refill on {}.", date));
                }
                body
            }
            Notice::MedicinesDispatched { prescription_id, .. } => {
                format!("Prescription {} has been dispatched.", prescription_id)
            }
            Notice::RefillDue {
                medicine_summary,
                due_date,
                ..
            } => format!(
                "Your supply runs out on {}. Last filled:\n{}",
                due_date, medicine_summary
            ),
        }
    }
}

/// Outbound notification channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        tracing::info!(
            patient_id = notice.patient_id(),
            subject = notice.subject(),
            body = %notice.body(),
            "notification"
        );
        Ok(())
    }
}

/// Send a notice, logging instead of failing.
pub(crate) fn deliver(notifier: &dyn Notifier, notice: &Notice) -> bool {
    match notifier.notify(notice) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                patient_id = notice.patient_id(),
                subject = notice.subject(),
                error = %e,
                "notification failed"
            );
            false
        }
    }
}
