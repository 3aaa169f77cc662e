//! API router.
//!
//! Every route lives under `/api/`. All but `/health` require a caller
//! identity. Layers, outermost first: request log, identity check, handler.

use axum::routing::{get, post, put};
use axum::Router;

use crate::endpoints;
use crate::middleware;
use crate::state::AppState;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    // NOTE: path params use `:param` syntax (axum 0.7)
    let protected = Router::new()
        .route(
            "/refill-requests",
            post(endpoints::refill_requests::create).get(endpoints::refill_requests::list),
        )
        .route(
            "/refill-requests/:id/approve",
            put(endpoints::refill_requests::approve),
        )
        .route(
            "/refill-requests/:id/reject",
            put(endpoints::refill_requests::reject),
        )
        .route("/refills/:id", get(endpoints::refills::detail))
        .route("/refills/:id/fill", post(endpoints::refills::fill))
        .route("/refills/:id/dispatch", post(endpoints::refills::dispatch))
        .route(
            "/tracking/subscribe/:prescription_id",
            get(endpoints::tracking::subscribe),
        )
        .route(
            "/tracking/:prescription_id",
            get(endpoints::tracking::history).post(endpoints::tracking::record),
        )
        .route(
            "/tracking/:prescription_id/progress",
            get(endpoints::tracking::progress),
        )
        .route(
            "/tracking/:prescription_id/delivered",
            post(endpoints::tracking::delivered),
        )
        .route("/prescriptions", post(endpoints::prescriptions::register))
        .route(
            "/prescriptions/:id/review",
            put(endpoints::prescriptions::review),
        )
        .route(
            "/prescriptions/:id/history",
            get(endpoints::prescriptions::history),
        )
        .route("/inventory", get(endpoints::inventory::list))
        .route("/inventory/:medicine_id", put(endpoints::inventory::upsert))
        .route(
            "/reminders/settings",
            put(endpoints::reminders::update_settings),
        )
        .route("/reminders/stats", get(endpoints::reminders::stats))
        .route("/reminders/trigger", post(endpoints::reminders::trigger))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::require_actor));

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(trace_request))
}

/// One log line per request with method, path, status and latency.
async fn trace_request(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}
