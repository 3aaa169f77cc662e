//! API errors with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use rx_refill_core::{FieldError, RefillError};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),
    #[error("Nothing to fill")]
    NothingToFill,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut fields = Vec::new();
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Validation(errors) => {
                fields = errors;
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "One or more fields are invalid".to_string(),
                )
            }
            ApiError::InvalidState(detail) => (StatusCode::CONFLICT, "INVALID_STATE", detail),
            ApiError::InvalidTransition(detail) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", detail)
            }
            ApiError::DuplicateRequest(detail) => (
                StatusCode::CONFLICT,
                "DUPLICATE_REQUEST",
                format!("A refill has already been requested: {}", detail),
            ),
            ApiError::NothingToFill => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NOTHING_TO_FILL",
                "Select at least one dose time and a positive number of days".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                fields,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<RefillError> for ApiError {
    fn from(err: RefillError) -> Self {
        match err {
            RefillError::Validation(fields) => ApiError::Validation(fields),
            RefillError::InvalidState(detail) => ApiError::InvalidState(detail),
            RefillError::InvalidTransition(detail) => ApiError::InvalidTransition(detail),
            RefillError::DuplicateRequest(detail) => ApiError::DuplicateRequest(detail),
            RefillError::NothingToFill => ApiError::NothingToFill,
            RefillError::NotFound(detail) => ApiError::NotFound(detail),
            RefillError::Forbidden(detail) => ApiError::Forbidden(detail),
            RefillError::Database(e) => ApiError::Internal(e.to_string()),
            RefillError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let response = ApiError::from(RefillError::Validation(vec![
            FieldError::new("pincode", "Pincode must be 6 digits"),
            FieldError::new("phone", "Phone must be 10 digits"),
        ]))
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["fields"][0]["field"], "pincode");
        assert_eq!(json["error"]["fields"][1]["field"], "phone");
    }

    #[tokio::test]
    async fn status_mapping() {
        let cases = [
            (RefillError::InvalidState("x".into()), StatusCode::CONFLICT),
            (RefillError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (RefillError::DuplicateRequest("x".into()), StatusCode::CONFLICT),
            (RefillError::NothingToFill, StatusCode::UNPROCESSABLE_ENTITY),
            (RefillError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (RefillError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (RefillError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_details_hidden() {
        let response = ApiError::Internal("disk I/O error at /var/lib".into()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
        assert!(json["error"].get("fields").is_none());
    }
}
