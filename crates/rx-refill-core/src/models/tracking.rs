//! Prescription tracking events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracking steps, declared in timeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    Uploaded,
    Approved,
    RefillRequested,
    RefillApproved,
    Filling,
    Filled,
    Dispatched,
    Delivered,
}

impl TrackingStatus {
    /// The canonical timeline.
    pub const ALL: [TrackingStatus; 8] = [
        TrackingStatus::Uploaded,
        TrackingStatus::Approved,
        TrackingStatus::RefillRequested,
        TrackingStatus::RefillApproved,
        TrackingStatus::Filling,
        TrackingStatus::Filled,
        TrackingStatus::Dispatched,
        TrackingStatus::Delivered,
    ];

    /// Position in the canonical timeline.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    /// Human-readable step label.
    pub fn label(&self) -> &'static str {
        match self {
            TrackingStatus::Uploaded => "Prescription uploaded",
            TrackingStatus::Approved => "Prescription approved",
            TrackingStatus::RefillRequested => "Refill requested",
            TrackingStatus::RefillApproved => "Refill approved",
            TrackingStatus::Filling => "Filling medicines",
            TrackingStatus::Filled => "Medicines filled",
            TrackingStatus::Dispatched => "Dispatched",
            TrackingStatus::Delivered => "Delivered",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Uploaded => "UPLOADED",
            TrackingStatus::Approved => "APPROVED",
            TrackingStatus::RefillRequested => "REFILL_REQUESTED",
            TrackingStatus::RefillApproved => "REFILL_APPROVED",
            TrackingStatus::Filling => "FILLING",
            TrackingStatus::Filled => "FILLED",
            TrackingStatus::Dispatched => "DISPATCHED",
            TrackingStatus::Delivered => "DELIVERED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_uppercase();
        Self::ALL.iter().copied().find(|s| s.as_str() == upper)
    }
}

/// A single point on a prescription's timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub id: String,
    pub prescription_id: String,
    pub status: TrackingStatus,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TrackingEvent {
    pub fn new(prescription_id: &str, status: TrackingStatus, notes: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prescription_id: prescription_id.to_string(),
            status,
            timestamp: Utc::now(),
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_timeline() {
        for (i, status) in TrackingStatus::ALL.iter().enumerate() {
            assert_eq!(status.ordinal(), i);
        }
        assert_eq!(TrackingStatus::Dispatched.ordinal(), 6);
    }

    #[test]
    fn test_parse_round_trips_names() {
        assert_eq!(
            TrackingStatus::parse("refill_requested"),
            Some(TrackingStatus::RefillRequested)
        );
        assert_eq!(TrackingStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_event_wire_format() {
        let event = TrackingEvent::new("rx-1", TrackingStatus::RefillApproved, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "REFILL_APPROVED");
        assert_eq!(json["prescriptionId"], "rx-1");
        assert!(json["timestamp"].is_string());
    }
}
