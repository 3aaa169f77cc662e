//! Fill input, fill history and refill reminder models.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Pharmacist-entered dosing schedule for one medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FillItemInput {
    pub medicine_id: String,
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub afternoon: bool,
    #[serde(default)]
    pub night: bool,
    /// Number of days to supply
    #[serde(default)]
    pub days: i32,
}

impl FillItemInput {
    pub fn new(medicine_id: &str, morning: bool, afternoon: bool, night: bool, days: i32) -> Self {
        Self {
            medicine_id: medicine_id.to_string(),
            morning,
            afternoon,
            night,
            days,
        }
    }

    /// Doses per day (count of selected dose times).
    pub fn times_per_day(&self) -> u32 {
        [self.morning, self.afternoon, self.night]
            .iter()
            .filter(|t| **t)
            .count() as u32
    }

    /// An item counts toward a fill only with a dose time and a positive day count.
    pub fn is_eligible(&self) -> bool {
        self.times_per_day() > 0 && self.days > 0
    }
}

/// One medicine as dispensed in a fill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilledMedicine {
    pub medicine_id: String,
    /// Catalog name at fill time
    pub medicine_name: String,
    pub times_per_day: u32,
    pub days: u32,
    /// times_per_day × days
    pub total_needed: u32,
    /// Needed more than was in stock
    pub low_stock: bool,
    pub stock_before: i64,
    pub stock_after: i64,
}

/// Fill history status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillHistoryStatus {
    Filled,
    Dispatched,
}

/// Record of a completed fill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FillHistoryEntry {
    pub id: String,
    pub refill_request_id: String,
    pub prescription_id: String,
    pub patient_id: String,
    pub pharmacist_id: String,
    /// Dispensed medicines, in input order
    pub medicines: Vec<FilledMedicine>,
    pub status: FillHistoryStatus,
    pub fill_date: DateTime<Utc>,
    pub refill_reminder_date: Option<NaiveDate>,
}

impl FillHistoryEntry {
    /// Longest supply among the dispensed medicines.
    pub fn max_days(&self) -> u32 {
        self.medicines.iter().map(|m| m.days).max().unwrap_or(0)
    }

    /// One `- Name (xN)` line per medicine, for notifications.
    pub fn medicine_summary(&self) -> String {
        self.medicines
            .iter()
            .map(|m| format!("- {} (x{})", m.medicine_name, m.total_needed))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Days before the supply runs out that the reminder fires.
pub const REMINDER_LEAD_DAYS: u64 = 3;

/// A scheduled "time to refill" reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefillReminder {
    pub id: String,
    pub prescription_id: String,
    pub patient_id: String,
    /// Supply length the reminder was computed from
    pub days_until_refill: u32,
    pub reminder_date: NaiveDate,
    pub enabled: bool,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefillReminder {
    pub fn new(
        prescription_id: String,
        patient_id: String,
        days_until_refill: u32,
        reminder_date: NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prescription_id,
            patient_id,
            days_until_refill,
            reminder_date,
            enabled: true,
            sent: false,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Day the current supply runs out.
    pub fn refill_due_date(&self) -> NaiveDate {
        self.reminder_date
            .checked_add_days(Days::new(REMINDER_LEAD_DAYS))
            .unwrap_or(self.reminder_date)
    }
}

/// A patient's choice to receive refill reminders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub patient_id: String,
    pub enabled: bool,
    /// Existing reminders switched by this change
    pub reminders_updated: usize,
}

/// Reminder counts for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStats {
    pub total_reminders: usize,
    pub enabled_reminders: usize,
    /// Enabled, unsent and dated today
    pub due_today: usize,
    pub sent_today: usize,
}
