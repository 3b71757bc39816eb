//! Router configuration module - RESTful v1 API

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::app_state::AppState;
use crate::auth::require_operator;
use crate::handlers::{admin, billing, health, meters, periods, proofs, submissions};
use crate::middleware::metrics_middleware;

/// Requests still running after this are answered with 408
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the application router.
pub fn build_router(app_state: AppState) -> Router {
    // Health and metrics (always at root)
    let ops = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::get_prometheus_metrics));

    let operator = admin::routes().route_layer(middleware::from_fn_with_state(
        app_state.clone(),
        require_operator,
    ));

    let v1_api = Router::new()
        .nest("/meters", meters::routes()) // POST /api/v1/meters, GET /api/v1/meters/{meter}
        .nest("/submissions", submissions::routes()) // POST /api/v1/submissions
        .nest("/periods", periods::routes()) // GET /api/v1/periods/current
        .nest("/bills", billing::bill_routes()) // POST /api/v1/bills/{meter}/{period}
        .nest("/settlements", billing::settlement_routes()) // GET /api/v1/settlements/{id}/summary
        .nest("/proofs", proofs::routes()) // GET /api/v1/proofs/{hash}?block=
        .nest("/admin", operator);

    ops.nest("/api/v1", v1_api)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    axum::http::StatusCode::REQUEST_TIMEOUT,
                    std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS),
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
