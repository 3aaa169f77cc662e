//! Tracking timeline projection and live publishing.
//!
//! Events may arrive in any order and with arbitrary timestamps. The
//! projection only cares which steps have been seen: the furthest step
//! present marks progress, and every earlier step counts as done.

mod feed;

pub use feed::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{TrackingEvent, TrackingStatus};

/// One step on the rendered timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStep {
    pub status: TrackingStatus,
    pub label: &'static str,
    pub done: bool,
    /// Timestamp of the last event seen for this step
    pub timestamp: Option<DateTime<Utc>>,
}

/// Timeline projection for one prescription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingProgress {
    /// Ordinal of the furthest step seen, or -1 when there are no events
    pub active_index: i32,
    pub steps: Vec<TrackingStep>,
    pub can_mark_delivered: bool,
}

impl TrackingProgress {
    /// Whether the step at `ordinal` is complete.
    pub fn is_done(&self, ordinal: usize) -> bool {
        i32::try_from(ordinal).map_or(false, |i| i <= self.active_index)
    }
}

/// Ordinal of the furthest status present, or -1.
pub fn active_index(events: &[TrackingEvent]) -> i32 {
    events
        .iter()
        .map(|e| e.status.ordinal() as i32)
        .max()
        .unwrap_or(-1)
}

/// Delivery can be confirmed once dispatched and not yet delivered.
pub fn can_mark_delivered(active_index: i32) -> bool {
    active_index >= TrackingStatus::Dispatched.ordinal() as i32
        && active_index < TrackingStatus::Delivered.ordinal() as i32
}

/// Fold events into the canonical timeline.
pub fn project(events: &[TrackingEvent]) -> TrackingProgress {
    let active = active_index(events);

    let steps = TrackingStatus::ALL
        .iter()
        .map(|status| TrackingStep {
            status: *status,
            label: status.label(),
            done: (status.ordinal() as i32) <= active,
            timestamp: events
                .iter()
                .filter(|e| e.status == *status)
                .last()
                .map(|e| e.timestamp),
        })
        .collect();

    TrackingProgress {
        active_index: active,
        steps,
        can_mark_delivered: can_mark_delivered(active),
    }
}

/// Receives tracking events after they are committed.
pub trait TrackingPublisher: Send + Sync {
    fn publish(&self, event: &TrackingEvent);
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl TrackingPublisher for NoopPublisher {
    fn publish(&self, _event: &TrackingEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn events(statuses: &[TrackingStatus]) -> Vec<TrackingEvent> {
        statuses
            .iter()
            .map(|s| TrackingEvent::new("rx-1", *s, None))
            .collect()
    }

    #[test]
    fn test_no_events() {
        let progress = project(&[]);
        assert_eq!(progress.active_index, -1);
        assert!(progress.steps.iter().all(|s| !s.done));
        assert!(!progress.can_mark_delivered);
        assert_eq!(progress.steps.len(), 8);
    }

    #[test]
    fn test_out_of_order_dispatch() {
        let progress = project(&events(&[TrackingStatus::Dispatched, TrackingStatus::Uploaded]));

        assert_eq!(progress.active_index, TrackingStatus::Dispatched.ordinal() as i32);
        // Steps never recorded still count as done when a later one exists
        assert!(progress.is_done(TrackingStatus::Filling.ordinal()));
        assert!(progress.steps[TrackingStatus::RefillApproved.ordinal()].done);
        assert!(progress.steps[TrackingStatus::RefillApproved.ordinal()].timestamp.is_none());
        assert!(!progress.is_done(TrackingStatus::Delivered.ordinal()));
        assert!(progress.can_mark_delivered);
    }

    #[test]
    fn test_delivered_disables_button() {
        let progress = project(&events(&[
            TrackingStatus::Dispatched,
            TrackingStatus::Delivered,
        ]));
        assert_eq!(progress.active_index, 7);
        assert!(!progress.can_mark_delivered);
    }

    #[test]
    fn test_before_dispatch_disables_button() {
        let progress = project(&events(&[TrackingStatus::Uploaded, TrackingStatus::Filled]));
        assert_eq!(progress.active_index, TrackingStatus::Filled.ordinal() as i32);
        assert!(!progress.can_mark_delivered);
    }

    #[test]
    fn test_timestamps_do_not_affect_progress() {
        let mut evs = events(&[TrackingStatus::Filled, TrackingStatus::Approved]);
        evs[0].timestamp = Utc::now() - Duration::days(10);
        assert_eq!(active_index(&evs), TrackingStatus::Filled.ordinal() as i32);
    }

    #[test]
    fn test_step_takes_last_timestamp() {
        let mut evs = events(&[TrackingStatus::Uploaded, TrackingStatus::Uploaded]);
        let later = Utc::now() + Duration::minutes(5);
        evs[1].timestamp = later;
        assert_eq!(project(&evs).steps[0].timestamp, Some(later));
    }

    #[test]
    fn test_progress_serializes_camel_case() {
        let json = serde_json::to_value(project(&[])).unwrap();
        assert_eq!(json["activeIndex"], -1);
        assert_eq!(json["canMarkDelivered"], false);
        assert_eq!(json["steps"][0]["status"], "UPLOADED");
    }
}
