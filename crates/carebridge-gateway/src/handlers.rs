// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway API.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use carebridge_agent::{ApprovalOutcome, ChatRequest, PendingSummary};
use carebridge_core::{CarebridgeError, ConversationId, HealthStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::feedback::Feedback;
use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error category.
    pub kind: String,
}

/// Request body for POST /approve.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub conversation_id: ConversationId,
    pub approved: bool,
    #[serde(default)]
    pub clinician_note: Option<String>,
}

/// Response body for POST /approve.
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    /// "approved", "rejected", "expired" or "error".
    pub status: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ApproveResponse {
    fn error(response: String) -> Self {
        Self {
            status: "error".into(),
            response,
            draft_id: None,
            result: None,
        }
    }
}

impl From<ApprovalOutcome> for ApproveResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        Self {
            status: outcome.status.to_string(),
            response: outcome.response(),
            draft_id: Some(outcome.draft_id),
            result: outcome.result,
        }
    }
}

/// Response body for GET /pending.
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub count: usize,
    pub pending: Vec<PendingSummary>,
}

/// Health of one collaborator.
#[derive(Debug, Serialize)]
pub struct CollaboratorHealth {
    pub name: String,
    pub adapter_type: String,
    /// "healthy", "degraded" or "unhealthy".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when every collaborator is healthy, "degraded" otherwise.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tools: usize,
    pub collaborators: Vec<CollaboratorHealth>,
}

/// Request body for POST /feedback.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Response body for POST /feedback.
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
    pub count: usize,
}

/// HTTP status for an agent error.
pub fn status_for(err: &CarebridgeError) -> StatusCode {
    match err {
        CarebridgeError::PatientBindingConflict { .. } => StatusCode::BAD_REQUEST,
        CarebridgeError::NoPendingAction(_) => StatusCode::CONFLICT,
        CarebridgeError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        CarebridgeError::DraftExpired { .. } => StatusCode::GONE,
        CarebridgeError::Provider { .. } | CarebridgeError::Upstream { .. } => {
            StatusCode::BAD_GATEWAY
        }
        CarebridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &CarebridgeError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        warn!(kind = err.kind(), error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
    )
        .into_response()
}

fn invalid_request(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: message.to_string(),
            kind: "invalid_request".to_string(),
        }),
    )
        .into_response()
}

/// POST /chat
///
/// Runs one turn. A blank `patient_uuid` is treated as absent.
pub async fn post_chat(
    State(state): State<GatewayState>,
    Json(mut body): Json<ChatRequest>,
) -> Response {
    if body.message.trim().is_empty() {
        return invalid_request("message must not be empty");
    }
    body.patient_uuid = body
        .patient_uuid
        .filter(|p| !p.as_str().trim().is_empty());

    match state.agent.chat(body).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /approve
///
/// An expired draft is a normal outcome for the client, so it is reported
/// with 200 and `status: "expired"` rather than as an error.
pub async fn post_approve(
    State(state): State<GatewayState>,
    Json(body): Json<ApproveRequest>,
) -> Response {
    let decision = state
        .agent
        .decide(&body.conversation_id, body.approved, body.clinician_note)
        .await;

    match decision {
        Ok(outcome) => {
            info!(
                conversation_id = %body.conversation_id,
                status = %outcome.status,
                "decision applied"
            );
            (StatusCode::OK, Json(ApproveResponse::from(outcome))).into_response()
        }
        Err(CarebridgeError::DraftExpired { expired_at }) => (
            StatusCode::OK,
            Json(ApproveResponse {
                status: "expired".into(),
                response: format!(
                    "The draft expired at {expired_at} before review and was discarded. \
                     Nothing was written to the patient record."
                ),
                draft_id: None,
                result: None,
            }),
        )
            .into_response(),
        Err(
            e @ (CarebridgeError::NoPendingAction(_) | CarebridgeError::ConversationNotFound(_)),
        ) => (status_for(&e), Json(ApproveResponse::error(e.to_string()))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /pending
pub async fn get_pending(State(state): State<GatewayState>) -> Response {
    match state.agent.pending().await {
        Ok(pending) => Json(PendingResponse {
            count: pending.len(),
            pending,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /health
///
/// Probes every collaborator concurrently. Answers 503 when any of them is
/// unhealthy.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let probes = state.health.collaborators.iter().map(|c| async move {
        let (status, detail) = match c.health_check().await {
            Ok(HealthStatus::Healthy) => ("healthy", None),
            Ok(HealthStatus::Degraded(reason)) => ("degraded", Some(reason)),
            Ok(HealthStatus::Unhealthy(reason)) => ("unhealthy", Some(reason)),
            Err(e) => ("unhealthy", Some(e.to_string())),
        };
        CollaboratorHealth {
            name: c.name().to_string(),
            adapter_type: c.adapter_type().to_string(),
            status: status.to_string(),
            detail,
        }
    });
    let collaborators = futures::future::join_all(probes).await;

    let all_healthy = collaborators.iter().all(|c| c.status == "healthy");
    let any_unhealthy = collaborators.iter().any(|c| c.status == "unhealthy");
    let code = if any_unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status: if all_healthy { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.health.start_time.elapsed().as_secs(),
            tools: state.agent.tool_names().len(),
            collaborators,
        }),
    )
        .into_response()
}

/// POST /feedback
pub async fn post_feedback(
    State(state): State<GatewayState>,
    Json(body): Json<FeedbackRequest>,
) -> Response {
    if !(1..=5).contains(&body.rating) {
        return invalid_request("rating must be between 1 and 5");
    }
    let count = state
        .feedback
        .record(Feedback {
            conversation_id: body.conversation_id,
            rating: body.rating,
            comment: body.comment.filter(|c| !c.trim().is_empty()),
            received_at: chrono::Utc::now(),
        })
        .await;
    info!(rating = body.rating, count, "feedback recorded");

    Json(FeedbackResponse {
        status: "recorded".into(),
        count,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_request_deserializes_without_note() {
        let req: ApproveRequest =
            serde_json::from_str(r#"{"conversation_id": "c-1", "approved": true}"#).unwrap();
        assert_eq!(req.conversation_id, ConversationId::from("c-1"));
        assert!(req.approved);
        assert!(req.clinician_note.is_none());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&CarebridgeError::NoPendingAction("c".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&CarebridgeError::upstream("rxnav", "down")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CarebridgeError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&CarebridgeError::LoopLimitExceeded { iterations: 10 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_approve_response_omits_empty_fields() {
        let json = serde_json::to_string(&ApproveResponse::error("nothing pending".into())).unwrap();
        assert_eq!(json, r#"{"status":"error","response":"nothing pending"}"#);
    }

    #[test]
    fn feedback_request_needs_rating() {
        assert!(serde_json::from_str::<FeedbackRequest>(r#"{"comment": "ok"}"#).is_err());
        let req: FeedbackRequest = serde_json::from_str(r#"{"rating": 5}"#).unwrap();
        assert_eq!(req.rating, 5);
    }
}
