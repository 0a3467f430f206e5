// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use carebridge_core::PluginAdapter;
use carebridge_gateway::{GatewayState, router};
use carebridge_test_utils::TestHarness;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(h: &TestHarness) -> Router {
    let collaborators = vec![
        h.ehr.clone() as Arc<dyn PluginAdapter>,
        h.drugs.clone() as Arc<dyn PluginAdapter>,
    ];
    router(GatewayState::new(h.agent.clone(), collaborators), true)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

#[tokio::test]
async fn chat_returns_a_conversation_id() {
    let h = TestHarness::new();
    h.provider.push_text("Hello, how can I help?").await;
    let app = app(&h);

    let (status, body) = post(&app, "/chat", json!({"message": "Hi", "patient_uuid": "P1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello, how can I help?");
    assert_eq!(body["session_locked"], true);
    assert_eq!(body["pending_approval"], false);
    assert!(!body["conversation_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn blank_message_is_unprocessable() {
    let h = TestHarness::new();
    let (status, body) = post(&app(&h), "/chat", json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_request");
    assert!(h.provider.requests().await.is_empty());
}

#[tokio::test]
async fn blank_patient_is_treated_as_absent() {
    let h = TestHarness::new();
    let (status, body) = post(&app(&h), "/chat", json!({"message": "Hi", "patient_uuid": ""})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_locked"], false);
}

#[tokio::test]
async fn switching_patient_is_a_bad_request() {
    let h = TestHarness::new();
    let app = app(&h);
    let (_, first) = post(&app, "/chat", json!({"message": "Hi", "patient_uuid": "P1"})).await;

    let (status, body) = post(
        &app,
        "/chat",
        json!({
            "message": "Now the other one",
            "patient_uuid": "P2",
            "conversation_id": first["conversation_id"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "patient_binding_conflict");
}

#[tokio::test]
async fn provider_failure_maps_to_bad_gateway() {
    let h = TestHarness::new();
    h.provider.push_failure("overloaded").await;
    let (status, body) = post(&app(&h), "/chat", json!({"message": "Hi"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "provider");
}

#[tokio::test]
async fn loop_limit_maps_to_internal_error() {
    let h = TestHarness::builder().with_max_iterations(1).build();
    h.provider
        .push_tool_calls(&[("search_patients", json!({"name": "Santos"}))])
        .await;
    let (status, body) = post(&app(&h), "/chat", json!({"message": "Find Santos"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "loop_limit_exceeded");
}

#[tokio::test]
async fn draft_approval_round_trip() {
    let h = TestHarness::new();
    h.provider
        .push_tool_calls(&[(
            "create_clinical_note",
            json!({"patient_uuid": "P1", "note_type": "SOAP", "content": "S: feeling well."}),
        )])
        .await;
    h.provider.push_text("Draft ready for review.").await;
    let app = app(&h);

    let (_, chat) = post(&app, "/chat", json!({"message": "Draft a SOAP note", "patient_uuid": "P1"})).await;
    assert_eq!(chat["pending_approval"], true);
    assert_eq!(chat["pending_action"]["note"]["note_type"], "SOAP");
    let conversation_id = chat["conversation_id"].clone();

    let (status, pending) = send(&app, "GET", "/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["pending"][0]["patient_uuid"], "P1");

    let (status, approved) = post(
        &app,
        "/approve",
        json!({"conversation_id": conversation_id.clone(), "approved": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert_eq!(h.ehr.notes_written().await.len(), 1);

    let (status, again) = post(
        &app,
        "/approve",
        json!({"conversation_id": conversation_id, "approved": true}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["status"], "error");
    assert_eq!(h.ehr.notes_written().await.len(), 1);
}

#[tokio::test]
async fn expired_draft_is_reported_not_written() {
    let h = TestHarness::new();
    h.provider
        .push_tool_calls(&[(
            "create_clinical_note",
            json!({"patient_uuid": "P1", "note_type": "Progress", "content": "Stable."}),
        )])
        .await;
    h.provider.push_text("Draft ready.").await;
    let app = app(&h);
    let (_, chat) = post(&app, "/chat", json!({"message": "Draft", "patient_uuid": "P1"})).await;

    h.clock.advance(chrono::Duration::hours(25));
    let (status, body) = post(
        &app,
        "/approve",
        json!({"conversation_id": chat["conversation_id"], "approved": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "expired");
    assert!(h.ehr.notes_written().await.is_empty());
}

#[tokio::test]
async fn approving_an_unknown_conversation_is_not_found() {
    let h = TestHarness::new();
    let (status, body) = post(
        &app(&h),
        "/approve",
        json!({"conversation_id": "missing", "approved": false}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn health_reports_each_collaborator() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tools"], 11);
    assert_eq!(body["collaborators"].as_array().unwrap().len(), 2);

    h.ehr.set_unhealthy(true);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["collaborators"][0]["status"], "unhealthy");
}

#[tokio::test]
async fn feedback_validates_rating_and_counts() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, _) = post(&app, "/feedback", json!({"rating": 6})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = post(&app, "/feedback", json!({"rating": 5, "comment": "Accurate"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let (_, body) = post(&app, "/feedback", json!({"rating": 2})).await;
    assert_eq!(body["count"], 2);
}
