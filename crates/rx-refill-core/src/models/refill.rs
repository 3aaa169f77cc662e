//! Refill request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Refill request lifecycle status.
///
/// ```text
/// PENDING ──► APPROVED ──► FILLED ──► DISPATCHED
///    │
///    └──────► REJECTED
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefillStatus {
    /// Requested by the patient, awaiting a pharmacist
    Pending,
    /// Approved, awaiting fill
    Approved,
    /// Rejected by a pharmacist
    Rejected,
    /// Medicines counted out
    Filled,
    /// Handed to delivery
    Dispatched,
}

impl RefillStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefillStatus::Rejected | RefillStatus::Dispatched)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: RefillStatus) -> bool {
        matches!(
            (self, next),
            (RefillStatus::Pending, RefillStatus::Approved)
                | (RefillStatus::Pending, RefillStatus::Rejected)
                | (RefillStatus::Approved, RefillStatus::Filled)
                | (RefillStatus::Filled, RefillStatus::Dispatched)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefillStatus::Pending => "PENDING",
            RefillStatus::Approved => "APPROVED",
            RefillStatus::Rejected => "REJECTED",
            RefillStatus::Filled => "FILLED",
            RefillStatus::Dispatched => "DISPATCHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Some(RefillStatus::Pending),
            "APPROVED" => Some(RefillStatus::Approved),
            "REJECTED" => Some(RefillStatus::Rejected),
            "FILLED" => Some(RefillStatus::Filled),
            "DISPATCHED" => Some(RefillStatus::Dispatched),
            _ => None,
        }
    }
}

/// A single invalid input field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Delivery address snapshot taken when the refill is requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeliveryAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    /// Six-digit postal code
    pub pincode: String,
    /// Ten-digit contact number
    pub phone: String,
}

impl DeliveryAddress {
    /// Trim every field; a blank second line becomes `None`.
    pub fn normalized(&self) -> Self {
        Self {
            line1: self.line1.trim().to_string(),
            line2: self
                .line2
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            pincode: self.pincode.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }

    /// Check every required field, reporting all failures at once.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.line1.trim().is_empty() {
            errors.push(FieldError::new("line1", "Address line 1 is required"));
        }
        if self.city.trim().is_empty() {
            errors.push(FieldError::new("city", "City is required"));
        }
        if self.state.trim().is_empty() {
            errors.push(FieldError::new("state", "State is required"));
        }
        if !is_digits(self.pincode.trim(), 6) {
            errors.push(FieldError::new("pincode", "Pincode must be 6 digits"));
        }
        if !is_digits(self.phone.trim(), 10) {
            errors.push(FieldError::new("phone", "Phone must be 10 digits"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// A patient's request to refill an approved prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefillRequest {
    /// Unique request ID
    pub id: String,
    /// Prescription being refilled (at most one request per prescription)
    pub prescription_id: String,
    /// Requesting patient
    pub patient_id: String,
    /// Pharmacist who approved or rejected
    pub pharmacist_id: Option<String>,
    /// Where the medicines go
    pub address: DeliveryAddress,
    pub status: RefillStatus,
    pub requested_at: DateTime<Utc>,
    /// Last pharmacist action timestamp
    pub actioned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl RefillRequest {
    /// Create a new pending request.
    pub fn new(prescription_id: String, patient_id: String, address: DeliveryAddress) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prescription_id,
            patient_id,
            pharmacist_id: None,
            address,
            status: RefillStatus::Pending,
            requested_at: Utc::now(),
            actioned_at: None,
            rejection_reason: None,
        }
    }
}
