//! HTTP endpoint handlers, one module per resource.

pub mod health;
pub mod inventory;
pub mod prescriptions;
pub mod refill_requests;
pub mod refills;
pub mod reminders;
pub mod tracking;

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parse a body that may be omitted.
///
/// An empty body is `None`. Anything else must be well-formed JSON sent as
/// `application/json`, otherwise the request fails instead of being treated
/// as if no body was sent.
pub(crate) fn optional_json<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| {
            ct.trim_start().to_ascii_lowercase().starts_with("application/json")
        });
    if !is_json {
        return Err(ApiError::BadRequest(
            "Expected request with `Content-Type: application/json`".to_string(),
        ));
    }

    let Json(value) = Json::<T>::from_bytes(body)?;
    Ok(Some(value))
}
