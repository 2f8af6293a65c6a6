//! Request flows through the HTTP router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use tx_lifecycle_coordinator::api::create_router;
use tx_lifecycle_coordinator::app::AppState;
use tx_lifecycle_coordinator::domain::{LifecycleRecord, LifecycleState};
use tx_lifecycle_coordinator::test_utils::{MockLedgerClient, RecordingNotificationSurface};

fn create_test_state() -> Arc<AppState> {
    create_state_with(MockLedgerClient::new())
}

fn create_state_with(ledger: MockLedgerClient) -> Arc<AppState> {
    let ledger = Arc::new(ledger);
    let surface = Arc::new(RecordingNotificationSurface::new());
    Arc::new(AppState::new(ledger as _, surface as _))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn register_payload() -> Value {
    json!({
        "capability": "registerBattery",
        "label": "Register battery NV-2024-001234",
        "args": [
            {"type": "identifier", "value": "NV-2024-001234"},
            {"type": "uint", "value": 75000}
        ]
    })
}

async fn poll_until(router: &Router, call_site: &str, state: LifecycleState) -> LifecycleRecord {
    for _ in 0..200 {
        let (status, body) = send(router, empty_request("GET", &format!("/call-sites/{}", call_site))).await;
        assert_eq!(status, StatusCode::OK);
        let record: LifecycleRecord = serde_json::from_value(body).unwrap();
        if record.state == state {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("call site {} never reached {}", call_site, state);
}

#[tokio::test]
async fn test_health_endpoints() {
    let router = create_router(create_test_state());

    let (status, body) = send(&router, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ledger"], "healthy");
    assert_eq!(body["call_sites"], 0);

    let (status, _) = send(&router, empty_request("GET", "/health/live")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reflects_ledger_health() {
    let ledger = MockLedgerClient::new();
    ledger.set_healthy(false);
    let router = create_router(create_state_with(ledger));

    let (status, _) = send(&router, empty_request("GET", "/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_open_call_site_then_conflict() {
    let router = create_router(create_test_state());

    let (status, body) = send(&router, json_request("PUT", "/call-sites/battery-form", json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["call_site"], "battery-form");
    assert_eq!(body["state"], "idle");
    assert_eq!(body["attempt_token"], 0);

    let (status, body) = send(&router, json_request("PUT", "/call-sites/battery-form", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "duplicate");

    let (status, body) = send(&router, empty_request("GET", "/call-sites")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_call_site_limit_returns_too_many_requests() {
    let ledger = Arc::new(MockLedgerClient::new());
    let surface = Arc::new(RecordingNotificationSurface::new());
    let state = AppState::new(ledger as _, surface as _).with_max_call_sites(1);
    let router = create_router(Arc::new(state));

    let (status, _) = send(&router, json_request("PUT", "/call-sites/form-a", json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, json_request("PUT", "/call-sites/form-b", json!({}))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["type"], "registry_full");

    let (status, body) = send(&router, json_request("POST", "/call-sites/form-c/run", register_payload())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["type"], "registry_full");

    let (status, _) = send(&router, json_request("POST", "/call-sites/form-a/run", register_payload())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_open_call_site_rejects_bad_options() {
    let router = create_router(create_test_state());

    let (status, body) = send(
        &router,
        json_request("PUT", "/call-sites/form", json!({"confirmation_timeout_ms": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");

    let (status, _) = send(&router, json_request("PUT", "/call-sites/bad%20id", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_action_until_confirmed() {
    let router = create_router(create_test_state());

    let (status, body) = send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["attempt_token"], 1);
    assert_eq!(body["capability"], "registerBattery");

    let record = poll_until(&router, "form", LifecycleState::Confirmed).await;
    assert!(record.handle.is_some());
    assert!(record.correlation_hash.unwrap().starts_with("0xhash-"));
    assert!(record.error_kind.is_none());

    let (status, body) = send(&router, empty_request("GET", "/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "success");
    assert_eq!(
        notifications[0]["message"]["title"],
        "Register battery NV-2024-001234 confirmed"
    );
}

#[tokio::test]
async fn test_run_action_validation_errors() {
    let router = create_router(create_test_state());

    let (status, body) = send(
        &router,
        json_request("POST", "/call-sites/form/run", json!({"capability": "", "label": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/call-sites/form/run",
            json!({
                "capability": "registerBattery",
                "label": "Too long",
                "args": [{"type": "identifier", "value": "X".repeat(33)}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "codec_error");
}

#[tokio::test]
async fn test_ledger_failure_surfaces_as_classified_record() {
    let router = create_router(create_state_with(MockLedgerClient::failing(
        "insufficient funds for gas * price + value",
    )));

    let (status, _) = send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let record = poll_until(&router, "form", LifecycleState::Failed).await;
    assert_eq!(record.error_message.as_deref(), Some("insufficient funds for gas * price + value"));
    let (_, body) = send(&router, empty_request("GET", "/call-sites/form")).await;
    assert_eq!(body["error_kind"], "insufficient_resources");

    let (status, body) = send(&router, empty_request("POST", "/call-sites/form/acknowledge")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert!(body["error_kind"].is_null());
}

#[tokio::test]
async fn test_unknown_call_site_is_not_found() {
    let router = create_router(create_test_state());

    for (method, uri) in [
        ("GET", "/call-sites/missing"),
        ("DELETE", "/call-sites/missing"),
        ("POST", "/call-sites/missing/cancel"),
        ("POST", "/call-sites/missing/acknowledge"),
    ] {
        let (status, body) = send(&router, empty_request(method, uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_eq!(body["error"]["type"], "not_found");
    }
}

#[tokio::test]
async fn test_acknowledge_in_flight_conflicts_and_cancel_resets() {
    let router = create_router(create_state_with(
        MockLedgerClient::new().with_confirm_delay(Duration::from_secs(60)),
    ));

    send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;

    let (status, body) = send(&router, empty_request("POST", "/call-sites/form/acknowledge")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "not_terminal");

    let (status, body) = send(&router, empty_request("POST", "/call-sites/form/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["attempt_token"], 1);

    let (_, body) = send(&router, empty_request("GET", "/notifications")).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_reentry_policy_over_http() {
    let state = create_state_with(MockLedgerClient::new().with_confirm_delay(Duration::from_secs(60)));
    let router = create_router(state);

    let (status, _) = send(
        &router,
        json_request("PUT", "/call-sites/form", json!({"reentry": "reject"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "attempt_in_flight");
}

#[tokio::test]
async fn test_supersede_is_the_default() {
    let state = create_state_with(MockLedgerClient::new().with_confirm_delay(Duration::from_secs(60)));
    let router = create_router(state);

    send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    let (status, body) = send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["attempt_token"], 2);

    let (_, body) = send(&router, empty_request("GET", "/notifications")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_close_call_site() {
    let router = create_router(create_state_with(
        MockLedgerClient::new().with_confirm_delay(Duration::from_secs(60)),
    ));

    send(&router, json_request("POST", "/call-sites/form/run", register_payload())).await;
    let (status, body) = send(&router, empty_request("DELETE", "/call-sites/form")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    let (status, _) = send(&router, empty_request("GET", "/call-sites/form")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(&router, empty_request("GET", "/notifications")).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_identifier_encode_and_decode() {
    let router = create_router(create_test_state());

    let (status, body) = send(
        &router,
        json_request("POST", "/identifiers/encode", json!({"identifier": "NV-2024-001234"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let encoded = body["bytes32"].as_str().unwrap().to_string();
    assert_eq!(
        encoded,
        "0x4e562d323032342d303031323334000000000000000000000000000000000000"
    );

    let (status, body) = send(
        &router,
        json_request("POST", "/identifiers/decode", json!({"bytes32": encoded})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "NV-2024-001234");

    let (status, body) = send(
        &router,
        json_request("POST", "/identifiers/encode", json!({"identifier": "A".repeat(33)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "codec_error");

    let (status, body) = send(
        &router,
        json_request("POST", "/identifiers/decode", json!({"bytes32": "0x1234"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "codec_error");
}

#[tokio::test]
async fn test_classify_error_endpoint() {
    let router = create_router(create_test_state());

    let cases = [
        (json!({"message": "MetaMask Tx Signature: User denied transaction signature."}), "user_rejected"),
        (json!({"message": "whatever", "code": 4001}), "user_rejected"),
        (json!({"message": "execution reverted: Battery does not exist"}), "validation_failed"),
        (json!({"message": "execution reverted"}), "reverted"),
        (json!({"message": "request timed out"}), "network_timeout"),
        (json!({"message": "something odd"}), "unknown"),
    ];

    for (payload, expected) in cases {
        let (status, body) = send(&router, json_request("POST", "/errors/classify", payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], expected, "payload {}", payload);
        assert!(body["headline"].as_str().is_some_and(|h| !h.is_empty()));
    }
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let router = create_router(create_test_state());

    let (status, body) = send(&router, empty_request("GET", "/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    for path in [
        "/call-sites",
        "/call-sites/{id}",
        "/call-sites/{id}/run",
        "/identifiers/encode",
        "/errors/classify",
        "/health",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
}
