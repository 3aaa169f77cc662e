//! HTTP API for the rx-refill core.
//!
//! Exposes the refill lifecycle over JSON, streams tracking events to live
//! subscribers over SSE and runs the periodic refill-reminder sweep.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod hub;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use hub::{SubscriptionEvent, TrackingHub, TrackingSubscription};
pub use router::build_router;
pub use server::{start, RefillServer};
pub use state::AppState;
