//! Prescription models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status set by a pharmacist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionStatus {
    /// Uploaded, awaiting review
    Pending,
    /// Approved; refills may be requested
    Approved,
    /// Rejected; never changes again
    Rejected,
    /// Pharmacist needs more information from the patient
    RequiresClarification,
}

impl PrescriptionStatus {
    /// Whether a pharmacist may still set a review outcome.
    pub fn is_reviewable(&self) -> bool {
        matches!(
            self,
            PrescriptionStatus::Pending | PrescriptionStatus::RequiresClarification
        )
    }
}

/// A prescription uploaded by a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Unique prescription ID
    pub id: String,
    /// Owning patient
    pub patient_id: String,
    /// Location of the uploaded image/PDF in file storage
    pub image_url: Option<String>,
    /// Review status
    pub status: PrescriptionStatus,
    /// Notes left by the reviewing pharmacist
    pub review_notes: Option<String>,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
    /// Review timestamp
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Prescription {
    /// Create a new pending prescription.
    pub fn new(patient_id: String, image_url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            image_url,
            status: PrescriptionStatus::Pending,
            review_notes: None,
            uploaded_at: Utc::now(),
            reviewed_at: None,
        }
    }
}
