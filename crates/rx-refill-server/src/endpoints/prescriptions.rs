//! Prescription upload, review and fill history.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::Deserialize;

use rx_refill_core::{Actor, FillHistoryEntry, Prescription, PrescriptionStatus};

use super::optional_json;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub image_url: Option<String>,
}

/// `POST /api/prescriptions`
pub async fn register(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Prescription>, ApiError> {
    let image_url = optional_json::<RegisterBody>(&headers, &body)?
        .and_then(|b| b.image_url)
        .filter(|url| !url.trim().is_empty());
    Ok(Json(state.core.register_prescription(&actor, image_url)?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub status: PrescriptionStatus,
    pub notes: Option<String>,
}

/// `PUT /api/prescriptions/:id/review`
pub async fn review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
    payload: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<Json<Prescription>, ApiError> {
    let Json(body) = payload?;
    let prescription = state.core.review_prescription(
        &actor,
        &prescription_id,
        body.status,
        body.notes.as_deref(),
    )?;
    Ok(Json(prescription))
}

/// `GET /api/prescriptions/:id/history`
pub async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Vec<FillHistoryEntry>>, ApiError> {
    Ok(Json(state.core.fill_history(&actor, &prescription_id)?))
}
