use std::path::PathBuf;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ivr_api::{build_app_with, GatewayConfig};
use ivr_dispatch::{not_understood_reply, MENU_TEXT};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    build_app_with(GatewayConfig::default())
        .await
        .expect("app should build")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}

#[tokio::test]
async fn health_reports_rule_count() {
    let (status, body) = send(
        app().await,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["intent_rules"], 7);
}

#[tokio::test]
async fn every_menu_digit_gets_a_canned_reply() {
    let app = app().await;

    for digit in ["1", "2", "3", "4", "5", "6", "7"] {
        let (status, body) = send(
            app.clone(),
            post_json("/ivr/request", json!({ "sessionId": "s-digits", "digit": digit })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "digit {digit}");
        assert_eq!(body["sessionId"], "s-digits");
        assert!(body["response"].as_str().is_some_and(|text| !text.is_empty()));
    }
}

#[tokio::test]
async fn digit_nine_repeats_the_menu() {
    let (status, body) = send(
        app().await,
        post_json("/ivr/request", json!({ "sessionId": "s-menu", "digit": "9" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], MENU_TEXT);
}

#[tokio::test]
async fn numeric_digit_is_accepted() {
    let (status, body) = send(
        app().await,
        post_json("/ivr/request", json!({ "sessionId": "s-num", "digit": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Your account balance is ₹500.");
}

#[tokio::test]
async fn invalid_digit_is_bad_request() {
    for digit in ["8", "0", "12"] {
        let (status, body) = send(
            app().await,
            post_json("/ivr/request", json!({ "sessionId": "s-bad", "digit": digit })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "digit {digit}");
        assert_eq!(body["error"], "invalid_digit");
        assert_eq!(body["message"], "Invalid option selected");
    }
}

#[tokio::test]
async fn missing_session_is_bad_request() {
    let (status, body) = send(app().await, post_json("/ivr/request", json!({ "digit": "1" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_session");
}

#[tokio::test]
async fn both_or_neither_inputs_are_bad_request() {
    let app = app().await;

    let (status, body) = send(
        app.clone(),
        post_json(
            "/ivr/request",
            json!({ "sessionId": "s-both", "digit": "1", "query": "check balance" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, body) = send(app, post_json("/ivr/request", json!({ "sessionId": "s-none" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/ivr/request")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_body");
}

#[tokio::test]
async fn conversation_returns_intent_and_reply() {
    let (status, body) = send(
        app().await,
        post_json(
            "/conversation/process",
            json!({ "sessionId": "voice-1", "query": "I want to recharge my phone" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "recharge_account");
    assert_eq!(body["service"], "acs");
    assert_eq!(body["digit"], "2");
    assert_eq!(body["confidence"].as_f64().map(|c| (c * 100.0).round()), Some(85.0));
    assert!(body["response"]
        .as_str()
        .is_some_and(|text| text.starts_with("Your recharge has been processed")));
}

#[tokio::test]
async fn conversation_cancel_wins_over_last_transaction() {
    let (status, body) = send(
        app().await,
        post_json(
            "/conversation/process",
            json!({ "sessionId": "voice-2", "query": "cancel my last transaction" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "cancel_action");
    assert_eq!(body["service"], "bap");
    assert_eq!(body["digit"], "7");
}

#[tokio::test]
async fn conversation_unknown_is_not_an_error() {
    let (status, body) = send(
        app().await,
        post_json(
            "/conversation/process",
            json!({ "sessionId": "voice-3", "query": "what's the weather like today" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "unknown");
    assert_eq!(body["service"], "unknown");
    assert_eq!(body["digit"], "0");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["response"], not_understood_reply());
}

#[tokio::test]
async fn providers_answer_only_their_digits() {
    let app = app().await;

    let (status, body) = send(
        app.clone(),
        post_json("/acs/process", json!({ "sessionId": "s-acs", "digit": "4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().is_some_and(|text| text.starts_with("Loan Information")));

    let (status, body) = send(
        app.clone(),
        post_json("/bap/process", json!({ "sessionId": "s-bap", "digit": "5" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().is_some_and(|text| text.starts_with("Connecting you")));

    let (status, _) = send(
        app,
        post_json("/bap/process", json!({ "sessionId": "s-bap", "digit": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn intents_listing_is_ordered_by_digit() {
    let (status, body) = send(
        app().await,
        Request::builder().uri("/ivr/intents").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let digits = body["intents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["digit"].as_str().unwrap().to_string())
        .collect::<String>();
    assert_eq!(digits, "1234567");
}

#[tokio::test]
async fn rate_limiter_refuses_bursts() {
    let config = GatewayConfig {
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 2,
        ..GatewayConfig::default()
    };
    let app = build_app_with(config).await.unwrap();

    for _ in 0..2 {
        let (status, _) = send(
            app.clone(),
            post_json("/ivr/request", json!({ "sessionId": "s-rl", "digit": "9" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        app.clone(),
        post_json("/ivr/request", json!({ "sessionId": "s-rl", "digit": "9" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (status, _) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn custom_rule_file_drives_routing() {
    let path = std::env::temp_dir().join(format!("ivr-rules-{}.json", std::process::id()));
    std::fs::write(
        &path,
        json!({
            "rules": [
                { "name": "balance_inquiry", "service": "acs", "digit": "1",
                  "keywords": ["saldo"], "fallback_confidence": 0.7 },
                { "name": "agent_support", "service": "bap", "digit": "5",
                  "keywords": ["asesor"], "fallback_confidence": 0.85 }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = GatewayConfig {
        rules_path: Some(PathBuf::from(&path)),
        ..GatewayConfig::default()
    };
    let app = build_app_with(config).await.unwrap();
    std::fs::remove_file(&path).ok();

    let (status, body) = send(
        app.clone(),
        post_json("/conversation/process", json!({ "sessionId": "es-1", "query": "Mi SALDO" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "balance_inquiry");

    let (status, _) = send(
        app,
        post_json("/ivr/request", json!({ "sessionId": "es-1", "digit": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_rule_file_fails_startup() {
    let path = std::env::temp_dir().join(format!("ivr-bad-rules-{}.json", std::process::id()));
    std::fs::write(
        &path,
        json!({
            "rules": [
                { "name": "menu", "service": "bap", "digit": "9",
                  "keywords": ["menu"], "fallback_confidence": 0.85 }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = GatewayConfig {
        rules_path: Some(path.clone()),
        ..GatewayConfig::default()
    };
    let result = build_app_with(config).await;
    std::fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_bypass_the_limiter() {
    let config = GatewayConfig {
        rate_limit_max: 1,
        ..GatewayConfig::default()
    };
    let app = build_app_with(config).await.unwrap();

    let mut accepted = 0;
    for n in 0..20 {
        let mut request = post_json("/ivr/request", json!({ "sessionId": "s-xff", "digit": "9" }));
        request.headers_mut().insert(
            "x-forwarded-for",
            format!("198.51.100.{n}").parse().unwrap(),
        );
        let (status, _) = send(app.clone(), request).await;
        if status == StatusCode::OK {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let config = GatewayConfig {
        max_body_bytes: 64,
        ..GatewayConfig::default()
    };
    let app = build_app_with(config).await.unwrap();

    let (status, _) = send(
        app,
        post_json(
            "/conversation/process",
            json!({ "sessionId": "s-big", "query": "recharge ".repeat(32) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
