//! Per-prescription fan-out of tracking events to live subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use rx_refill_core::{TrackingEvent, TrackingPublisher};

/// Buffered events per prescription before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Routes committed tracking events to subscribers of the same prescription.
#[derive(Debug, Default)]
pub struct TrackingHub {
    channels: Mutex<HashMap<String, broadcast::Sender<TrackingEvent>>>,
}

impl TrackingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one prescription's events.
    pub fn subscribe(self: &Arc<Self>, prescription_id: &str) -> TrackingSubscription {
        let receiver = match self.channels.lock() {
            Ok(mut channels) => channels
                .entry(prescription_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe(),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(prescription_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe(),
        };

        tracing::debug!(prescription_id, "tracking subscriber attached");
        TrackingSubscription {
            prescription_id: prescription_id.to_string(),
            receiver: Some(receiver),
            hub: Arc::clone(self),
        }
    }

    /// Live subscribers for a prescription.
    pub fn subscriber_count(&self, prescription_id: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(prescription_id).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    /// Drop the channel once nobody listens.
    fn prune(&self, prescription_id: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            let idle = channels
                .get(prescription_id)
                .map_or(false, |tx| tx.receiver_count() == 0);
            if idle {
                channels.remove(prescription_id);
            }
        }
    }
}

impl TrackingPublisher for TrackingHub {
    fn publish(&self, event: &TrackingEvent) {
        let Ok(channels) = self.channels.lock() else {
            tracing::warn!(prescription_id = %event.prescription_id, "tracking hub lock poisoned");
            return;
        };
        if let Some(tx) = channels.get(&event.prescription_id) {
            // No receivers is not an error: subscribers come and go
            let delivered = tx.send(event.clone()).unwrap_or(0);
            tracing::debug!(
                prescription_id = %event.prescription_id,
                status = event.status.as_str(),
                delivered,
                "tracking event published"
            );
        }
    }
}

/// Outcome of waiting for the next event.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    Event(TrackingEvent),
    /// Events were dropped because the subscriber fell behind
    Lagged(u64),
    Closed,
}

/// A live subscription to one prescription's tracking events.
///
/// Dropping or closing it releases the channel; neither touches refill state.
#[derive(Debug)]
pub struct TrackingSubscription {
    prescription_id: String,
    receiver: Option<broadcast::Receiver<TrackingEvent>>,
    hub: Arc<TrackingHub>,
}

impl TrackingSubscription {
    pub fn prescription_id(&self) -> &str {
        &self.prescription_id
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> SubscriptionEvent {
        let Some(receiver) = self.receiver.as_mut() else {
            return SubscriptionEvent::Closed;
        };
        match receiver.recv().await {
            Ok(event) => SubscriptionEvent::Event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => SubscriptionEvent::Lagged(skipped),
            Err(broadcast::error::RecvError::Closed) => {
                self.close();
                SubscriptionEvent::Closed
            }
        }
    }

    /// Stop receiving. Idempotent.
    pub fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            drop(receiver);
            self.hub.prune(&self.prescription_id);
            tracing::debug!(prescription_id = %self.prescription_id, "tracking subscriber detached");
        }
    }
}

impl Drop for TrackingSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_refill_core::TrackingStatus;

    #[tokio::test]
    async fn delivers_to_matching_prescription_only() {
        let hub = Arc::new(TrackingHub::new());
        let mut rx1 = hub.subscribe("rx-1");
        let mut rx2 = hub.subscribe("rx-2");

        hub.publish(&TrackingEvent::new("rx-1", TrackingStatus::Filled, None));
        hub.publish(&TrackingEvent::new("rx-2", TrackingStatus::Dispatched, None));

        match rx1.recv().await {
            SubscriptionEvent::Event(e) => assert_eq!(e.status, TrackingStatus::Filled),
            other => panic!("unexpected {:?}", other),
        }
        match rx2.recv().await {
            SubscriptionEvent::Event(e) => assert_eq!(e.status, TrackingStatus::Dispatched),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_tears_down_channel() {
        let hub = Arc::new(TrackingHub::new());
        let mut sub = hub.subscribe("rx-1");
        let other = hub.subscribe("rx-1");
        assert_eq!(hub.subscriber_count("rx-1"), 2);

        sub.close();
        sub.close();
        assert!(sub.is_closed());
        assert_eq!(sub.recv().await, SubscriptionEvent::Closed);
        assert_eq!(hub.subscriber_count("rx-1"), 1);

        drop(other);
        assert_eq!(hub.subscriber_count("rx-1"), 0);
        assert!(hub.channels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let hub = TrackingHub::new();
        hub.publish(&TrackingEvent::new("rx-1", TrackingStatus::Filled, None));
        assert_eq!(hub.subscriber_count("rx-1"), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let hub = Arc::new(TrackingHub::new());
        let mut sub = hub.subscribe("rx-1");
        for _ in 0..(CHANNEL_CAPACITY + 3) {
            hub.publish(&TrackingEvent::new("rx-1", TrackingStatus::Filling, None));
        }
        assert_eq!(sub.recv().await, SubscriptionEvent::Lagged(3));
    }
}
