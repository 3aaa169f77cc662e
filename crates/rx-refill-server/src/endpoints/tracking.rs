//! Prescription tracking endpoints and the live event stream.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use rx_refill_core::{Actor, TrackingEvent, TrackingProgress, TrackingStatus};

use crate::error::ApiError;
use crate::hub::{SubscriptionEvent, TrackingSubscription};
use crate::state::AppState;

/// SSE event name carrying one tracking event.
pub const TRACKING_EVENT_NAME: &str = "tracking";

/// `GET /api/tracking/:prescriptionId`
pub async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Vec<TrackingEvent>>, ApiError> {
    Ok(Json(state.core.tracking_history(&actor, &prescription_id)?))
}

/// `GET /api/tracking/:prescriptionId/progress`
pub async fn progress(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
) -> Result<Json<TrackingProgress>, ApiError> {
    Ok(Json(state.core.tracking_progress(&actor, &prescription_id)?))
}

#[derive(Debug, Deserialize)]
pub struct RecordBody {
    pub status: TrackingStatus,
    pub notes: Option<String>,
}

/// `POST /api/tracking/:prescriptionId`: staff append an event by hand.
pub async fn record(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
    payload: Result<Json<RecordBody>, JsonRejection>,
) -> Result<Json<TrackingEvent>, ApiError> {
    let Json(body) = payload?;
    let notes = body.notes.filter(|n| !n.trim().is_empty());
    Ok(Json(state.core.record_tracking(
        &actor,
        &prescription_id,
        body.status,
        notes,
    )?))
}

#[derive(Debug, Serialize)]
pub struct DeliveredResponse {
    pub delivered: bool,
    pub events: Vec<TrackingEvent>,
}

/// `POST /api/tracking/:prescriptionId/delivered`
///
/// `delivered` is false when delivery had already been confirmed.
pub async fn delivered(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
) -> Result<Json<DeliveredResponse>, ApiError> {
    let outcome = state.core.mark_delivered(&actor, &prescription_id)?;
    Ok(Json(DeliveredResponse {
        delivered: outcome.newly_delivered,
        events: outcome.events,
    }))
}

/// `GET /api/tracking/subscribe/:prescriptionId`
///
/// Streams every committed event for the prescription as a `tracking` SSE
/// message. The subscription is released when the client disconnects.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Ownership and existence check before attaching
    state.core.tracking_progress(&actor, &prescription_id)?;

    let subscription = state.hub.subscribe(&prescription_id);
    tracing::info!(
        prescription_id = %prescription_id,
        user_id = %actor.user_id,
        "live tracking stream opened"
    );
    Ok(Sse::new(event_stream(subscription)).keep_alive(KeepAlive::default()))
}

/// Turn a subscription into SSE messages; ends when the hub closes it.
pub fn event_stream(
    subscription: TrackingSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        loop {
            match subscription.recv().await {
                SubscriptionEvent::Event(event) => {
                    match Event::default().event(TRACKING_EVENT_NAME).json_data(&event) {
                        Ok(message) => return Some((Ok(message), subscription)),
                        Err(e) => {
                            tracing::warn!(error = %e, "tracking event not serializable");
                        }
                    }
                }
                SubscriptionEvent::Lagged(skipped) => {
                    tracing::warn!(
                        prescription_id = %subscription.prescription_id(),
                        skipped,
                        "live tracking subscriber lagged"
                    );
                }
                SubscriptionEvent::Closed => return None,
            }
        }
    })
}
