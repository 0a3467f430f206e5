// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent orchestration for Carebridge.
//!
//! [`ClinicalAgent`] runs a whole chat turn: it opens the conversation's
//! session (waiting out any turn already in flight), applies the patient
//! binding, drives the [`ReasoningLoop`] under the turn timeout, and commits
//! the transcript and any new draft only if the turn succeeds. Drafts are
//! resolved separately through the [`ApprovalGate`].

pub mod approval;
pub mod context;
pub mod reasoning;
pub mod sanitizer;
pub mod session;
pub mod shutdown;
pub mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use carebridge_audit::{AuditAction, AuditEntry, AuditSink};
use carebridge_core::{
    CarebridgeError, Clock, ConversationId, EhrAdapter, Message, PatientId, PendingAction,
};
use carebridge_verify::VerificationResult;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub use approval::{ApprovalGate, ApprovalOutcome};
pub use reasoning::{LoopState, ReasoningLoop, TurnOutcome};
pub use sanitizer::{Sanitized, sanitize};
pub use session::{
    InMemoryBackend, PendingSummary, SessionBackend, SessionHandle, SessionRecord, SessionStore,
};

/// Default wall-clock budget for one turn.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

/// An inbound chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub patient_uuid: Option<PatientId>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// A tool call as executed, reported back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallSummary {
    pub name: String,
    pub args: serde_json::Value,
}

/// Reply to a chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub conversation_id: ConversationId,
    pub response: String,
    pub tool_calls: Vec<ToolCallSummary>,
    /// True once the conversation is bound to a patient.
    pub session_locked: bool,
    /// True while the conversation holds an undecided draft, whether it was
    /// drafted in this turn or an earlier one.
    pub pending_approval: bool,
    pub pending_action: Option<PendingAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
}

/// Appends to the audit trail, logging instead of failing the caller.
pub(crate) async fn record_audit(sink: &dyn AuditSink, entry: AuditEntry) {
    if let Err(e) = sink.append(entry).await {
        error!(error = %e, "failed to append audit record");
    }
}

/// Runs chat turns and approval decisions over shared session state.
pub struct ClinicalAgent {
    sessions: Arc<SessionStore>,
    reasoning: ReasoningLoop,
    approvals: ApprovalGate,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    turn_timeout: Duration,
    draft_ttl: chrono::Duration,
}

impl ClinicalAgent {
    pub fn new(
        reasoning: ReasoningLoop,
        sessions: Arc<SessionStore>,
        ehr: Arc<dyn EhrAdapter>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let clock = sessions.clock().clone();
        let approvals = ApprovalGate::new(sessions.clone(), ehr, audit.clone(), clock.clone());
        Self {
            sessions,
            reasoning,
            approvals,
            audit,
            clock,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            draft_ttl: chrono::Duration::hours(24),
        }
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    pub fn with_draft_ttl(mut self, draft_ttl: chrono::Duration) -> Self {
        self.draft_ttl = draft_ttl;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.reasoning.registry().names()
    }

    /// Runs one chat turn.
    ///
    /// A binding conflict fails before the model is called. Timeouts and
    /// collaborator failures abort the turn and leave the session exactly as
    /// it was.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, CarebridgeError> {
        let conversation_id = request
            .conversation_id
            .unwrap_or_else(ConversationId::generate);
        let mut session = self.sessions.open(&conversation_id).await?;
        let patient = session.bind(request.patient_uuid)?;
        let expired = session.take_expired(self.clock.now());

        info!(
            conversation_id = %conversation_id,
            patient_uuid = patient.as_ref().map(|p| p.as_str()).unwrap_or("-"),
            new = session.is_new(),
            "turn started"
        );

        let user_message = Message::user(request.message);
        let mut history = session.transcript().to_vec();
        history.push(user_message.clone());

        let run = self.reasoning.run(&history, patient.as_ref());
        let outcome = match tokio::time::timeout(self.turn_timeout, run).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(conversation_id = %conversation_id, error = %e, "turn failed");
                self.audit_failure(&conversation_id, patient.as_ref(), &e).await;
                return Err(e);
            }
            Err(_) => {
                let e = CarebridgeError::Timeout {
                    duration: self.turn_timeout,
                };
                warn!(conversation_id = %conversation_id, timeout = ?self.turn_timeout, "turn timed out");
                self.audit_failure(&conversation_id, patient.as_ref(), &e).await;
                return Err(e);
            }
        };

        session.append(std::iter::once(user_message).chain(outcome.messages));
        let drafted = outcome
            .draft
            .map(|note| PendingAction::new(note, self.clock.now(), self.draft_ttl));
        if let Some(draft) = &drafted {
            session.set_pending(draft.clone());
        }
        // A draft from an earlier turn stays outstanding until decided.
        let pending = session.pending().cloned();
        session.commit().await?;

        if let Some(stale) = expired {
            self.audit_entry(
                &conversation_id,
                Some(&stale.note.patient_uuid),
                AuditAction::DraftExpired,
                Vec::new(),
                "expired",
            )
            .await;
        }

        let tools: Vec<String> = outcome
            .invocations
            .iter()
            .map(|inv| inv.call.name.clone())
            .collect();
        if patient.is_some() || !tools.is_empty() {
            let label = match (&drafted, &outcome.verification) {
                (Some(_), _) => "drafted",
                (None, Some(v)) if !v.passed => "answered_with_caveat",
                _ => "answered",
            };
            self.audit_entry(&conversation_id, patient.as_ref(), AuditAction::Turn, tools, label)
                .await;
        }

        info!(
            conversation_id = %conversation_id,
            iterations = outcome.iterations,
            tool_calls = outcome.invocations.len(),
            drafted = drafted.is_some(),
            pending_approval = pending.is_some(),
            "turn completed"
        );

        Ok(ChatResponse {
            conversation_id,
            response: outcome.response,
            tool_calls: outcome
                .invocations
                .into_iter()
                .map(|inv| ToolCallSummary {
                    name: inv.call.name,
                    args: inv.call.args,
                })
                .collect(),
            session_locked: patient.is_some(),
            pending_approval: pending.is_some(),
            pending_action: pending,
            verification: outcome.verification,
        })
    }

    /// Approves or rejects the conversation's outstanding draft.
    pub async fn decide(
        &self,
        conversation_id: &ConversationId,
        approved: bool,
        clinician_note: Option<String>,
    ) -> Result<ApprovalOutcome, CarebridgeError> {
        self.approvals
            .submit_decision(conversation_id, approved, clinician_note)
            .await
    }

    /// Outstanding, unexpired drafts across all conversations.
    pub async fn pending(&self) -> Result<Vec<PendingSummary>, CarebridgeError> {
        self.sessions.list_pending().await
    }

    async fn audit_failure(
        &self,
        conversation_id: &ConversationId,
        patient: Option<&PatientId>,
        error: &CarebridgeError,
    ) {
        if patient.is_some() {
            self.audit_entry(
                conversation_id,
                patient,
                AuditAction::TurnFailed,
                Vec::new(),
                error.kind(),
            )
            .await;
        }
    }

    async fn audit_entry(
        &self,
        conversation_id: &ConversationId,
        patient: Option<&PatientId>,
        action: AuditAction,
        tools: Vec<String>,
        outcome: &str,
    ) {
        record_audit(
            self.audit.as_ref(),
            AuditEntry {
                timestamp: self.clock.now(),
                conversation_id: conversation_id.to_string(),
                patient_uuid: patient.map(|p| p.to_string()),
                action,
                tools,
                outcome: outcome.into(),
                clinician_note: None,
            },
        )
        .await;
    }
}
