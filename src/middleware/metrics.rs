use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Route template for labels, so `/bills/m-1/3` and `/bills/m-2/4` share a series
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware that tracks request metrics
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone())
        .increment(1);
    gauge!("http_requests_in_flight", "path" => path.clone()).increment(1.0);

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    histogram!(
        "http_request_duration_seconds",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .record(start.elapsed().as_secs_f64());

    gauge!("http_requests_in_flight", "path" => path.clone()).decrement(1.0);

    counter!(
        "http_responses_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    if response.status().is_server_error() {
        counter!(
            "http_errors_total",
            "method" => method,
            "path" => path,
            "status" => status
        )
        .increment(1);
    }

    response
}
