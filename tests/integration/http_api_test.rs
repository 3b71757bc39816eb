// HTTP API Integration Test
// Exercises the router end to end with in-process requests

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{new_ledger, operator, principal, reading};
use meter_ledger::config::{Config, LedgerConfig};
use meter_ledger::router::build_router;
use meter_ledger::startup::build_state;

const API_KEY: &str = "test-operator-key";

fn app() -> Router {
    let config = Config {
        environment: "test".to_string(),
        port: 0,
        log_level: "debug".to_string(),
        operator_api_key: API_KEY.to_string(),
        authority: operator(),
        snapshot_path: None,
        snapshot_interval_secs: 0,
        ledger: LedgerConfig::default(),
    };
    let ledger = new_ledger(&config.ledger);
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    build_router(build_state(config, ledger, metrics, None))
}

enum As {
    Anonymous,
    Operator,
    Meter(&'static str),
}

async fn call(app: &Router, method: Method, uri: &str, who: As, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    request = match who {
        As::Anonymous => request,
        As::Operator => request.header("X-API-Key", API_KEY),
        As::Meter(name) => request.header("X-Ledger-Principal", name),
    };
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn submission_body(meter: &str, nonce: u64, value: u64, block: u64) -> Value {
    let mut body = serde_json::to_value(reading(&principal(meter), nonce, value, block)).unwrap();
    body["current_block"] = json!(block);
    body
}

#[tokio::test]
async fn test_health_and_metrics_are_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["current_period"], 0);

    let (status, _) = call(&app, Method::GET, "/metrics", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_full_billing_cycle_over_http() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/meters",
        As::Meter("M"),
        Some(json!({ "settlement_id": 1, "current_block": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["active"], true);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/v1/admin/rates/1",
        As::Operator,
        Some(json!({ "rate": 200 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/submissions",
        As::Meter("M"),
        Some(submission_body("M", 1, 100, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["period"], 0);
    let proof_hash = body["data"]["proof_hash"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/proofs/{}?block=2", proof_hash),
        As::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], true);

    // Billing an open period is a lifecycle violation
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/bills/M/0",
        As::Anonymous,
        Some(json!({ "current_block": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["reason"], "PERIOD_NOT_CLOSED");
    assert_eq!(body["error"]["category"], "temporal");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/admin/periods/advance",
        As::Operator,
        Some(json!({ "current_block": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_period"], 1);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/bills/M/0",
        As::Anonymous,
        Some(json!({ "current_block": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["usage"], 100);
    assert_eq!(body["data"]["amount"], 20_000);

    let (_, body) = call(&app, Method::GET, "/api/v1/meters/M/balance?up_to=0", As::Anonymous, None).await;
    assert_eq!(body["data"]["outstanding"], 20_000);

    let (status, _) = call(&app, Method::POST, "/api/v1/admin/bills/M/0/paid", As::Operator, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::POST, "/api/v1/admin/bills/M/0/paid", As::Operator, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["reason"], "ALREADY_PAID");

    let (_, body) = call(&app, Method::GET, "/api/v1/bills/M/0", As::Anonymous, None).await;
    assert_eq!(body["data"]["paid"], true);

    let (_, body) = call(&app, Method::GET, "/api/v1/periods/0/totals", As::Anonymous, None).await;
    assert_eq!(body["data"]["total_billed"], 20_000);
    assert_eq!(body["data"]["bill_count"], 1);

    let (_, body) = call(&app, Method::GET, "/api/v1/settlements/1/summary?period=0", As::Anonymous, None).await;
    assert_eq!(body["data"]["effective_rate"]["source"], "settlement");
    assert_eq!(body["data"]["settlement_totals"]["total_usage"], 100);
}

#[tokio::test]
async fn test_admin_routes_require_operator_key() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/admin/periods/advance",
        As::Meter("M"),
        Some(json!({ "current_block": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTHZ_2001");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/admin/periods/advance",
        As::Anonymous,
        Some(json!({ "current_block": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/v1/admin/rates/global")
        .header("X-API-Key", "wrong")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "rate": 5 }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_meter_routes_reject_operator_and_missing_identity() {
    let app = app();
    let body = json!({ "settlement_id": 1, "current_block": 0 });

    let (status, _) = call(&app, Method::POST, "/api/v1/meters", As::Operator, Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::POST, "/api/v1/meters", As::Anonymous, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_1001");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = app();
    let body = json!({ "settlement_id": 1, "current_block": 0 });

    let (status, _) = call(&app, Method::POST, "/api/v1/meters", As::Meter("M"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, Method::POST, "/api/v1/meters", As::Meter("M"), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["reason"], "ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_malformed_submission_is_bad_request() {
    let app = app();
    call(
        &app,
        Method::POST,
        "/api/v1/meters",
        As::Meter("M"),
        Some(json!({ "settlement_id": 1, "current_block": 0 })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/submissions",
        As::Meter("M"),
        Some(json!({
            "encrypted_reading": "00112233445566778899",
            "proof": "00112233445566778899",
            "nonce": 1,
            "disclosed_reading": 10,
            "circuit_id": 1,
            "generated_at": 1,
            "current_block": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["reason"], "MALFORMED_PROOF");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/submissions",
        As::Meter("M"),
        Some(json!({ "nonce": "not a number" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3001");
}

#[tokio::test]
async fn test_batch_billing_reports_per_meter_results() {
    let app = app();
    for meter in ["A", "B"] {
        call(
            &app,
            Method::POST,
            "/api/v1/meters",
            As::Meter(meter),
            Some(json!({ "settlement_id": 1, "current_block": 0 })),
        )
        .await;
    }
    call(&app, Method::POST, "/api/v1/submissions", As::Meter("A"), Some(submission_body("A", 1, 30, 1))).await;
    call(
        &app,
        Method::POST,
        "/api/v1/admin/periods/advance",
        As::Operator,
        Some(json!({ "current_block": 2 })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/bills/batch",
        As::Anonymous,
        Some(json!({ "meter_ids": ["A", "B"], "period": 0, "current_block": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["succeeded"], 1);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["results"][0]["bill"]["amount"], 3_000);
    assert_eq!(body["data"]["results"][1]["error"]["reason"], "ZERO_USAGE");
}

#[tokio::test]
async fn test_unknown_resources_are_not_found() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/v1/meters/ghost", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/api/v1/bills/ghost/0", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/api/v1/periods/9", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/api/v1/proofs/zz?block=1", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3002");
}

#[tokio::test]
async fn test_period_params_update_is_all_or_nothing() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/v1/admin/periods/params",
        As::Operator,
        Some(json!({ "period_duration": 10, "max_reading_delta": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, "/api/v1/periods/current", As::Anonymous, None).await;
    assert_eq!(body["data"]["period"], 0);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/v1/admin/periods/params",
        As::Operator,
        Some(json!({ "period_duration": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["period_duration"], 10);
}

#[tokio::test]
async fn test_meter_named_me_is_addressable_and_deregisters_itself() {
    let app = app();
    let body = json!({ "settlement_id": 1, "current_block": 0 });
    for name in ["me", "M"] {
        let (status, _) = call(&app, Method::POST, "/api/v1/meters", As::Meter(name), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&app, Method::GET, "/api/v1/meters/me", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], true);

    let (status, body) = call(&app, Method::DELETE, "/api/v1/meters/me", As::Meter("M"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTHZ_2001");

    let (status, _) = call(&app, Method::DELETE, "/api/v1/meters/me", As::Meter("me"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, "/api/v1/meters/me", As::Anonymous, None).await;
    assert_eq!(body["data"]["active"], false);
    let (_, body) = call(&app, Method::GET, "/api/v1/meters/M", As::Anonymous, None).await;
    assert_eq!(body["data"]["active"], true);
}
