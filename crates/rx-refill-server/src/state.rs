//! Shared handler state.

use std::sync::Arc;

use rx_refill_core::RefillCore;

use crate::hub::TrackingHub;

/// State handed to every endpoint.
///
/// `core` publishes committed tracking events into `hub`, which fans them out
/// to live subscribers.
#[derive(Clone)]
pub struct AppState {
    pub core: RefillCore,
    pub hub: Arc<TrackingHub>,
}

impl AppState {
    /// Wire a core to a fresh tracking hub.
    pub fn new(core: RefillCore) -> Self {
        let hub = Arc::new(TrackingHub::new());
        let core = core.with_publisher(hub.clone());
        Self { core, hub }
    }
}
