//! Identity middleware.
//!
//! The upstream authentication service has already verified the caller and
//! forwards the result as `X-User-Id` / `X-User-Role`. This layer turns those
//! headers into an [`Actor`] request extension.

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use rx_refill_core::{Actor, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Require a caller identity on every request.
pub async fn require_actor(req: Request<Body>, next: Next) -> Response {
    match require_actor_inner(req, next).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn require_actor_inner(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let actor = actor_from_headers(req.headers()).ok_or(ApiError::Unauthorized)?;
    tracing::debug!(user_id = %actor.user_id, role = actor.role.as_str(), "request authenticated");
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Build an actor from identity headers; `None` when missing or malformed.
pub fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let user_id = headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty())?;
    let role = headers
        .get(USER_ROLE_HEADER)?
        .to_str()
        .ok()
        .and_then(Role::parse)?;
    Some(Actor::new(user_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn parses_identity() {
        let actor = actor_from_headers(&headers(&[
            (USER_ID_HEADER, "pharm-7"),
            (USER_ROLE_HEADER, "ROLE_PHARMACIST"),
        ]))
        .unwrap();
        assert_eq!(actor, Actor::pharmacist("pharm-7"));
    }

    #[test]
    fn rejects_missing_or_unknown() {
        assert!(actor_from_headers(&headers(&[(USER_ID_HEADER, "u1")])).is_none());
        assert!(actor_from_headers(&headers(&[(USER_ROLE_HEADER, "PATIENT")])).is_none());
        assert!(actor_from_headers(&headers(&[
            (USER_ID_HEADER, "  "),
            (USER_ROLE_HEADER, "PATIENT")
        ]))
        .is_none());
        assert!(actor_from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (USER_ROLE_HEADER, "courier")
        ]))
        .is_none());
    }
}
