// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end chat turns over the scripted provider and fixture EHR.

use std::time::Duration;

use carebridge_audit::AuditAction;
use carebridge_core::{CarebridgeError, ConversationId, PatientId};
use carebridge_test_utils::TestHarness;
use serde_json::json;

#[tokio::test]
async fn first_turn_binds_and_later_turns_inherit_the_patient() {
    let h = TestHarness::new();
    h.provider.push_text("Hello. How can I help with this patient?").await;

    let first = h.chat("Let's review this patient", Some("P1"), None).await.unwrap();
    assert!(first.session_locked);
    assert!(!first.pending_approval);

    let second = h
        .chat("Anything else?", None, Some(&first.conversation_id))
        .await
        .unwrap();
    assert!(second.session_locked);

    let requests = h.provider.requests().await;
    let prompt = requests[1].system_prompt.as_deref().unwrap();
    assert!(prompt.contains("ACTIVE PATIENT CONTEXT"));
    assert!(prompt.contains("P1"));
    // user, assistant, user
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn a_different_patient_is_rejected_before_the_model_runs() {
    let h = TestHarness::new();
    let first = h.chat("Start", Some("P1"), None).await.unwrap();

    let err = h
        .chat("Switch", Some("P2"), Some(&first.conversation_id))
        .await
        .unwrap_err();
    assert!(matches!(err, CarebridgeError::PatientBindingConflict { .. }));
    assert_eq!(h.provider.requests().await.len(), 1);

    let session = h.agent.sessions().open(&first.conversation_id).await.unwrap();
    assert_eq!(session.patient(), Some(&PatientId::from("P1")));
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn tool_arguments_are_rewritten_to_the_bound_patient() {
    let h = TestHarness::new();
    h.provider
        .push_tool_calls(&[("get_medications", json!({"patient_uuid": "P2"}))])
        .await;
    h.provider
        .push_text("Three active medications are on file.\nSource: get_medications")
        .await;

    let reply = h.chat("What is she taking?", Some("P1"), None).await.unwrap();
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].args["patient_uuid"], "P1");
    assert_eq!(h.ehr.patients_accessed().await, vec!["P1".to_string()]);
    assert!(reply.verification.unwrap().passed);
}

#[tokio::test]
async fn patient_scoped_tools_are_refused_without_a_binding() {
    let h = TestHarness::new();
    h.provider
        .push_tool_calls(&[
            ("get_medications", json!({"patient_uuid": "P1"})),
            ("search_patients", json!({"name": "Santos"})),
        ])
        .await;
    h.provider
        .push_text("One match: Maria Santos. Please confirm the patient.\nSource: search_patients")
        .await;

    let reply = h.chat("Find Maria Santos", None, None).await.unwrap();
    assert!(!reply.session_locked);
    assert!(h.ehr.patients_accessed().await.is_empty());

    let calls = h.ehr.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "search_patients");

    let requests = h.provider.requests().await;
    let results = requests[1].messages.last().unwrap();
    let rendered = serde_json::to_string(results).unwrap();
    assert!(rendered.contains("no patient is bound"));
}

#[tokio::test]
async fn unverified_drug_answer_is_retried_once_then_caveated() {
    let h = TestHarness::new();
    h.provider.push_text("Warfarin and aspirin together are fine.").await;
    h.provider.push_text("Warfarin and aspirin together are fine.").await;

    let reply = h.chat("Can she take aspirin?", Some("P1"), None).await.unwrap();
    let verification = reply.verification.unwrap();
    assert!(!verification.passed);
    assert_eq!(verification.retry_count, 1);
    assert!(reply.response.contains("Caveat"));
    assert!(reply.response.contains("drug_interactions"));

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 2);
    let feedback = requests[1].messages.last().unwrap().text();
    assert!(feedback.contains("drug_interaction_check"));

    let records = h.audit.records().await;
    let last = records.last().unwrap();
    assert_eq!(last.entry.action, AuditAction::Turn);
    assert_eq!(last.entry.outcome, "answered_with_caveat");
}

#[tokio::test]
async fn retry_that_runs_the_interaction_check_passes() {
    let h = TestHarness::new();
    h.provider.push_text("Warfarin with aspirin is fine.").await;
    h.provider
        .push_tool_calls(&[(
            "drug_interaction_check",
            json!({"drug_names": ["warfarin", "aspirin"]}),
        )])
        .await;
    h.provider
        .push_text(
            "Warfarin and aspirin interact: the combination raises bleeding risk.\n\
             Source: drug_interaction_check",
        )
        .await;

    let reply = h.chat("Can she take aspirin?", Some("P1"), None).await.unwrap();
    let verification = reply.verification.unwrap();
    assert!(verification.passed);
    assert_eq!(verification.retry_count, 1);
    assert!(!reply.response.contains("Caveat"));
    assert_eq!(h.provider.requests().await.len(), 3);
    assert_eq!(h.drugs.lookups().await, vec!["warfarin", "aspirin"]);
}

#[tokio::test]
async fn retry_cut_short_by_the_iteration_limit_keeps_the_first_answer() {
    let h = TestHarness::builder().with_max_iterations(2).build();
    h.provider
        .push_tool_calls(&[("get_medications", json!({"patient_uuid": "P1"}))])
        .await;
    h.provider.push_text("Warfarin and aspirin together are fine.").await;
    h.provider.push_text("Still fine.").await;

    let reply = h.chat("Can she take aspirin?", Some("P1"), None).await.unwrap();
    assert!(reply.response.starts_with("Warfarin and aspirin together are fine."));
    assert!(reply.response.contains("Caveat"));
    let verification = reply.verification.unwrap();
    assert!(!verification.passed);
    assert_eq!(verification.retry_count, 1);
    assert_eq!(h.provider.requests().await.len(), 2);
    assert_eq!(h.provider.remaining().await, 1);

    // user, tool use, tool results, first answer
    let session = h.agent.sessions().open(&reply.conversation_id).await.unwrap();
    assert_eq!(session.transcript().len(), 4);

    let records = h.audit.records().await;
    assert_eq!(records.last().unwrap().entry.outcome, "answered_with_caveat");
}

#[tokio::test]
async fn loop_limit_aborts_without_committing() {
    let h = TestHarness::builder().with_max_iterations(2).build();
    for _ in 0..2 {
        h.provider
            .push_tool_calls(&[("search_patients", json!({"name": "Santos"}))])
            .await;
    }
    let id = ConversationId::from("conv-loop");

    let err = h.chat("Find her", None, Some(&id)).await.unwrap_err();
    assert!(matches!(err, CarebridgeError::LoopLimitExceeded { iterations: 2 }));

    let session = h.agent.sessions().open(&id).await.unwrap();
    assert!(session.is_new());
    assert!(session.transcript().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stalled_model_times_out_and_is_audited() {
    let h = TestHarness::builder()
        .with_turn_timeout(Duration::from_secs(5))
        .build();
    h.provider.push_stall().await;

    let err = h.chat("Summarize", Some("P1"), None).await.unwrap_err();
    assert!(matches!(err, CarebridgeError::Timeout { .. }));

    let records = h.audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entry.action, AuditAction::TurnFailed);
    assert_eq!(records[0].entry.outcome, "timeout");
}

#[tokio::test]
async fn provider_failure_leaves_the_transcript_untouched() {
    let h = TestHarness::new();
    let first = h.chat("Start", Some("P1"), None).await.unwrap();
    h.provider.push_failure("overloaded").await;

    let err = h
        .chat("Continue", None, Some(&first.conversation_id))
        .await
        .unwrap_err();
    assert!(matches!(err, CarebridgeError::Provider { .. }));

    let session = h.agent.sessions().open(&first.conversation_id).await.unwrap();
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn concurrent_turns_on_one_conversation_run_in_order() {
    let h = TestHarness::new();
    let id = ConversationId::from("conv-busy");

    let (a, b) = tokio::join!(
        h.chat("First", Some("P1"), Some(&id)),
        h.chat("Second", Some("P1"), Some(&id)),
    );
    a.unwrap();
    b.unwrap();

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[1].messages.len(), 3);

    let session = h.agent.sessions().open(&id).await.unwrap();
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn unbound_small_talk_is_not_audited() {
    let h = TestHarness::new();
    h.chat("Hello", None, None).await.unwrap();
    assert!(h.audit.records().await.is_empty());
}
