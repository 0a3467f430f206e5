// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end agent tests.
//!
//! `TestHarness` wires a complete [`ClinicalAgent`] over the scripted
//! provider, the mock collaborators, a manual clock, and an in-memory audit
//! sink. Tests script the model, call [`TestHarness::chat`], and inspect
//! the mocks afterwards.

use std::sync::Arc;
use std::time::Duration;

use carebridge_agent::{ChatRequest, ChatResponse, ClinicalAgent, ReasoningLoop, SessionStore};
use carebridge_audit::MemoryAuditSink;
use carebridge_core::{CarebridgeError, ConversationId, ManualClock, PatientId};
use carebridge_tools::{ClinicalCollaborators, ToolRegistry, register_clinical_tools};
use carebridge_verify::Verifier;
use chrono::{TimeZone, Utc};

use crate::mock_ehr::MockEhr;
use crate::mock_provider::ScriptedProvider;
use crate::mock_reference::{MockDrugReference, MockIcd10, MockLiterature};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    verification: bool,
    max_iterations: usize,
    turn_timeout: Duration,
    draft_ttl: chrono::Duration,
    ehr: Option<MockEhr>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            verification: true,
            max_iterations: 10,
            turn_timeout: Duration::from_secs(120),
            draft_ttl: chrono::Duration::hours(24),
            ehr: None,
        }
    }

    /// Turns the heuristic verifier off.
    pub fn without_verification(mut self) -> Self {
        self.verification = false;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    pub fn with_draft_ttl(mut self, draft_ttl: chrono::Duration) -> Self {
        self.draft_ttl = draft_ttl;
        self
    }

    /// Replaces the default fixture EHR.
    pub fn with_ehr(mut self, ehr: MockEhr) -> Self {
        self.ehr = Some(ehr);
        self
    }

    pub fn build(self) -> TestHarness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        ));
        let provider = Arc::new(ScriptedProvider::new());
        let ehr = Arc::new(self.ehr.unwrap_or_else(MockEhr::with_fixture_patients));
        let drugs = Arc::new(MockDrugReference::new());
        let literature = Arc::new(MockLiterature::new());
        let audit = Arc::new(MemoryAuditSink::new());

        let mut registry = ToolRegistry::new();
        register_clinical_tools(
            &mut registry,
            &ClinicalCollaborators {
                ehr: ehr.clone(),
                drugs: drugs.clone(),
                icd10: Arc::new(MockIcd10),
                literature: literature.clone(),
                clock: clock.clone(),
            },
        )
        .expect("clinical tool schemas compile");

        let mut reasoning = ReasoningLoop::new(provider.clone(), Arc::new(registry), "mock-model")
            .with_max_iterations(self.max_iterations);
        if self.verification {
            reasoning = reasoning.with_verifier(Arc::new(Verifier::heuristic()));
        }

        let sessions = Arc::new(SessionStore::in_memory(clock.clone()));
        let agent = ClinicalAgent::new(reasoning, sessions, ehr.clone(), audit.clone())
            .with_turn_timeout(self.turn_timeout)
            .with_draft_ttl(self.draft_ttl);

        TestHarness {
            agent: Arc::new(agent),
            provider,
            ehr,
            drugs,
            literature,
            clock,
            audit,
        }
    }
}

/// A complete agent over mock collaborators.
pub struct TestHarness {
    pub agent: Arc<ClinicalAgent>,
    pub provider: Arc<ScriptedProvider>,
    pub ehr: Arc<MockEhr>,
    pub drugs: Arc<MockDrugReference>,
    pub literature: Arc<MockLiterature>,
    /// Starts at 2026-10-19T09:00:00Z.
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditSink>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Sends one chat message through the agent.
    pub async fn chat(
        &self,
        message: &str,
        patient: Option<&str>,
        conversation: Option<&ConversationId>,
    ) -> Result<ChatResponse, CarebridgeError> {
        self.agent
            .chat(ChatRequest {
                message: message.into(),
                patient_uuid: patient.map(PatientId::from),
                conversation_id: conversation.cloned(),
            })
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
