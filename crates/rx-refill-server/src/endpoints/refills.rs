//! Pharmacist fill and dispatch endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rx_refill_core::{Actor, FillItemInput, RefillDetail, RefillStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/refills/:id`: request, prescription and stock for the fill form.
pub async fn detail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
) -> Result<Json<RefillDetail>, ApiError> {
    Ok(Json(state.core.refill_detail(&actor, &request_id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBody {
    pub items: Vec<FillItemInput>,
    #[serde(default)]
    pub enable_reminders: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResponse {
    pub message: &'static str,
    pub low_stock_alerts: Vec<String>,
    pub refill_reminder_date: Option<NaiveDate>,
}

/// `POST /api/refills/:id/fill`
pub async fn fill(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
    payload: Result<Json<FillBody>, JsonRejection>,
) -> Result<Json<FillResponse>, ApiError> {
    let Json(body) = payload?;
    let outcome = state
        .core
        .fill(&actor, &request_id, &body.items, body.enable_reminders)?;

    Ok(Json(FillResponse {
        message: "Medicines filled successfully",
        low_stock_alerts: outcome.low_stock_alerts,
        refill_reminder_date: outcome.refill_reminder_date,
    }))
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub message: &'static str,
    pub status: RefillStatus,
}

/// `POST /api/refills/:id/dispatch`
pub async fn dispatch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let request = state.core.dispatch(&actor, &request_id)?;
    Ok(Json(DispatchResponse {
        message: "Medicines dispatched",
        status: request.status,
    }))
}
