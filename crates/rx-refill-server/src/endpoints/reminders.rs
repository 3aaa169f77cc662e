//! Refill reminder settings, statistics and on-demand sweeps.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use rx_refill_core::{Actor, ReminderSettings, ReminderStats, SweepSummary};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    pub enabled: bool,
    /// Defaults to the caller; only admins may name someone else
    pub patient_id: Option<String>,
}

/// `PUT /api/reminders/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<SettingsBody>, JsonRejection>,
) -> Result<Json<ReminderSettings>, ApiError> {
    let Json(body) = payload?;
    let patient_id = body.patient_id.unwrap_or_else(|| actor.user_id.clone());
    Ok(Json(
        state
            .core
            .set_reminders_enabled(&actor, &patient_id, body.enabled)?,
    ))
}

/// `GET /api/reminders/stats`
pub async fn stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ReminderStats>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.core.reminder_stats(&actor, today)?))
}

/// `POST /api/reminders/trigger`: run the sweep now instead of waiting for the next tick.
pub async fn trigger(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<SweepSummary>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.core.trigger_reminder_sweep(&actor, today)?))
}
