//! Stock management for pharmacists.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;

use rx_refill_core::{Actor, InventoryItem};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/inventory`
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(state.core.list_inventory(&actor)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBody {
    pub name: String,
    pub stock_quantity: i64,
    pub low_stock_threshold: Option<i64>,
}

/// `PUT /api/inventory/:medicineId`: create or replace a stock record.
pub async fn upsert(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(medicine_id): Path<String>,
    payload: Result<Json<UpsertBody>, JsonRejection>,
) -> Result<Json<InventoryItem>, ApiError> {
    let Json(body) = payload?;

    let mut item = InventoryItem::new(medicine_id, body.name.trim().to_string(), body.stock_quantity);
    if let Some(threshold) = body.low_stock_threshold {
        item.low_stock_threshold = threshold;
    }
    state.core.upsert_inventory(&actor, &item)?;
    Ok(Json(item))
}
