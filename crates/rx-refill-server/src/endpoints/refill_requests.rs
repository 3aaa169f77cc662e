//! Refill request endpoints.
//!
//! - `POST /api/refill-requests`: patient requests a refill
//! - `GET /api/refill-requests[?status=]`: list
//! - `PUT /api/refill-requests/:id/approve`
//! - `PUT /api/refill-requests/:id/reject`

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::Deserialize;

use rx_refill_core::{Actor, DeliveryAddress, FieldError, RefillRequest, RefillStatus};

use super::optional_json;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefillBody {
    #[serde(default)]
    pub prescription_id: String,
    #[serde(default)]
    pub address: DeliveryAddress,
}

/// `POST /api/refill-requests`
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateRefillBody>, JsonRejection>,
) -> Result<Json<RefillRequest>, ApiError> {
    let Json(body) = payload?;
    let prescription_id = body.prescription_id.trim();
    if prescription_id.is_empty() {
        return Err(ApiError::Validation(vec![FieldError::new(
            "prescriptionId",
            "Prescription is required",
        )]));
    }

    let request = state
        .core
        .create_refill_request(&actor, prescription_id, &body.address)?;
    Ok(Json(request))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// `GET /api/refill-requests`
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<RefillRequest>>, ApiError> {
    let Query(query) = query?;
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            RefillStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown refill status: {}", raw)))?,
        ),
        None => None,
    };

    Ok(Json(state.core.list_refill_requests(&actor, status)?))
}

/// `PUT /api/refill-requests/:id/approve`
pub async fn approve(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
) -> Result<Json<RefillRequest>, ApiError> {
    Ok(Json(state.core.approve(&actor, &request_id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

/// `PUT /api/refill-requests/:id/reject`; the body may be empty, but not malformed.
pub async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RefillRequest>, ApiError> {
    let reason = optional_json::<RejectBody>(&headers, &body)?.and_then(|b| b.reason);
    Ok(Json(state.core.reject(&actor, &request_id, reason.as_deref())?))
}
