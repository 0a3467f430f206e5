// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval gate for drafted clinical notes.
//!
//! The EHR write behind a draft happens here and nowhere else, and only for
//! a draft that is still pending and not past its expiry.

use std::sync::Arc;

use carebridge_audit::{AuditAction, AuditEntry, AuditSink};
use carebridge_core::{
    CarebridgeError, Clock, ConversationId, DraftState, EhrAdapter, Message, PendingAction,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::record_audit;
use crate::session::SessionStore;

/// Result of a successful decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalOutcome {
    pub status: DraftState,
    pub draft_id: String,
    /// EHR response for an approved write, `None` for a rejection.
    pub result: Option<serde_json::Value>,
}

impl ApprovalOutcome {
    /// Message shown to the clinician.
    pub fn response(&self) -> String {
        match self.status {
            DraftState::Approved => "The clinical note was saved to the patient record.".into(),
            DraftState::Rejected => "The draft was discarded. Nothing was written.".into(),
            DraftState::Expired => {
                "The draft expired before review and was discarded. Ask for a new draft if it is \
                 still needed."
                    .into()
            }
            DraftState::Pending => "The draft is still awaiting review.".into(),
        }
    }
}

/// Holds drafts between the turn that produced them and the clinician's decision.
pub struct ApprovalGate {
    sessions: Arc<SessionStore>,
    ehr: Arc<dyn EhrAdapter>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl ApprovalGate {
    pub fn new(
        sessions: Arc<SessionStore>,
        ehr: Arc<dyn EhrAdapter>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            ehr,
            audit,
            clock,
        }
    }

    /// Applies the clinician's decision to the conversation's draft.
    ///
    /// Fails with `NoPendingAction` when nothing is outstanding and with
    /// `DraftExpired` (after discarding the draft) when it is too old. An
    /// EHR failure on approval leaves the draft pending so it can be retried.
    pub async fn submit_decision(
        &self,
        conversation_id: &ConversationId,
        approved: bool,
        clinician_note: Option<String>,
    ) -> Result<ApprovalOutcome, CarebridgeError> {
        let mut session = self.sessions.open_existing(conversation_id).await?;
        let Some(draft) = session.pending().cloned() else {
            return Err(CarebridgeError::NoPendingAction(conversation_id.to_string()));
        };

        let now = self.clock.now();
        if draft.is_expired(now) {
            warn!(
                conversation_id = %conversation_id,
                draft_id = draft.id,
                expires_at = %draft.expires_at,
                "decision arrived for an expired draft"
            );
            session.clear_pending();
            session.append([Message::assistant_text(format!(
                "The {} note draft expired before review and was discarded.",
                draft.note.note_type
            ))]);
            session.commit().await?;
            self.audit(conversation_id, &draft, AuditAction::DraftExpired, "expired", clinician_note)
                .await;
            return Err(CarebridgeError::DraftExpired {
                expired_at: draft.expires_at.to_rfc3339(),
            });
        }

        if approved {
            let result = self.ehr.create_clinical_note(&draft.note).await?;
            session.clear_pending();
            session.append([Message::assistant_text(format!(
                "The clinician approved the {} note draft and it was saved to the patient record.",
                draft.note.note_type
            ))]);
            session.commit().await?;
            info!(
                conversation_id = %conversation_id,
                draft_id = draft.id,
                patient_uuid = %draft.note.patient_uuid,
                "draft approved and written"
            );
            self.audit(conversation_id, &draft, AuditAction::DraftApproved, "approved", clinician_note)
                .await;
            Ok(ApprovalOutcome {
                status: DraftState::Approved,
                draft_id: draft.id,
                result: Some(result),
            })
        } else {
            session.clear_pending();
            session.append([Message::assistant_text(format!(
                "The clinician rejected the {} note draft; it was discarded.",
                draft.note.note_type
            ))]);
            session.commit().await?;
            info!(conversation_id = %conversation_id, draft_id = draft.id, "draft rejected");
            self.audit(conversation_id, &draft, AuditAction::DraftRejected, "rejected", clinician_note)
                .await;
            Ok(ApprovalOutcome {
                status: DraftState::Rejected,
                draft_id: draft.id,
                result: None,
            })
        }
    }

    async fn audit(
        &self,
        conversation_id: &ConversationId,
        draft: &PendingAction,
        action: AuditAction,
        outcome: &str,
        clinician_note: Option<String>,
    ) {
        record_audit(
            self.audit.as_ref(),
            AuditEntry {
                timestamp: self.clock.now(),
                conversation_id: conversation_id.to_string(),
                patient_uuid: Some(draft.note.patient_uuid.to_string()),
                action,
                tools: vec!["create_clinical_note".into()],
                outcome: outcome.into(),
                clinician_note,
            },
        )
        .await;
    }
}
