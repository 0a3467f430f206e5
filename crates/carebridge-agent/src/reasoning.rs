// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reason/act/verify state machine that runs one turn.
//!
//! States: Reason -> (Act -> Reason)* -> Verify -> Done, or
//! Reason -> AwaitApproval -> Done when the latest tool batch produced a
//! draft. A failed verification sends the loop back to Reason once with
//! the findings appended; a second failure returns the answer with a caveat.
//! If the retry runs out of iterations, the first answer is returned with its
//! caveat instead.
//!
//! The loop never touches the session store. It works on a copy of the
//! transcript and hands back the messages it produced, so the caller can
//! commit the whole turn or nothing.

use std::fmt;
use std::sync::Arc;

use carebridge_core::{
    CarebridgeError, ClinicalNote, Message, PatientId, ProviderAdapter, ProviderRequest,
    ToolCall, ToolInvocation, ToolResult,
};
use carebridge_tools::ToolRegistry;
use carebridge_tools::builtin::note_from_draft;
use carebridge_verify::{VerificationResult, Verifier};
use tracing::{debug, info, warn};

use crate::context;
use crate::sanitizer::{self, Sanitized};

/// Default bound on model calls per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// States of the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Asking the model for an answer or tool calls.
    Reason,
    /// Executing the requested tool calls.
    Act,
    /// Checking a candidate answer.
    Verify,
    /// A draft was produced and the turn suspends for clinician review.
    AwaitApproval,
    /// The turn has a final response.
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Reason => write!(f, "reason"),
            LoopState::Act => write!(f, "act"),
            LoopState::Verify => write!(f, "verify"),
            LoopState::AwaitApproval => write!(f, "await_approval"),
            LoopState::Done => write!(f, "done"),
        }
    }
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text returned to the clinician, caveat included when present.
    pub response: String,
    /// Messages generated during the turn, oldest first.
    pub messages: Vec<Message>,
    /// Every executed (or rejected) tool call, post-sanitization.
    pub invocations: Vec<ToolInvocation>,
    /// Set when the turn ended in [`LoopState::AwaitApproval`].
    pub draft: Option<ClinicalNote>,
    /// `None` when verification is disabled or the turn produced a draft.
    pub verification: Option<VerificationResult>,
    /// Model calls made.
    pub iterations: usize,
}

/// Drives one turn against a provider and a tool registry.
pub struct ReasoningLoop {
    provider: Arc<dyn ProviderAdapter>,
    registry: Arc<ToolRegistry>,
    verifier: Option<Arc<Verifier>>,
    model: String,
    max_tokens: u32,
    max_iterations: usize,
    system_prompt: String,
}

impl ReasoningLoop {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        registry: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            verifier: None,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: context::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Runs a turn over `history`, whose last message is the new user input.
    pub async fn run(
        &self,
        history: &[Message],
        patient: Option<&PatientId>,
    ) -> Result<TurnOutcome, CarebridgeError> {
        let system_prompt = context::with_patient_context(&self.system_prompt, patient);
        let tools = self.registry.tool_definitions();

        let mut messages = history.to_vec();
        let start = messages.len();
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut last_batch: Vec<ToolInvocation> = Vec::new();
        let mut requested: Vec<ToolCall> = Vec::new();
        let mut answer = String::new();
        let mut draft = None;
        let mut verification = None;
        let mut retry_count: u8 = 0;
        // First answer that failed verification, with the transcript length
        // right after it. Returned with a caveat if the retry cannot finish.
        let mut rejected: Option<(String, VerificationResult, usize)> = None;
        let mut iterations = 0;
        let mut state = LoopState::Reason;

        while state != LoopState::Done {
            debug!(state = %state, iterations, "turn step");
            state = match state {
                LoopState::Reason => {
                    if iterations >= self.max_iterations {
                        if let Some((first, result, len)) = rejected.take() {
                            warn!(
                                max_iterations = self.max_iterations,
                                "verification retry hit the iteration limit, returning first answer with caveat"
                            );
                            messages.truncate(len);
                            answer = first;
                            answer.push_str(&result.caveat());
                            verification = Some(result);
                            break;
                        }
                        warn!(
                            max_iterations = self.max_iterations,
                            "reasoning loop did not converge"
                        );
                        return Err(CarebridgeError::LoopLimitExceeded {
                            iterations: self.max_iterations,
                        });
                    }
                    iterations += 1;

                    let response = self
                        .provider
                        .complete(ProviderRequest {
                            model: self.model.clone(),
                            system_prompt: Some(system_prompt.clone()),
                            messages: messages.clone(),
                            tools: tools.clone(),
                            max_tokens: self.max_tokens,
                        })
                        .await?;

                    requested = response.tool_calls();
                    answer = response.text();
                    messages.push(Message::assistant(response.content));

                    if !requested.is_empty() {
                        LoopState::Act
                    } else if let Some(note) = drafted_note(&last_batch) {
                        draft = Some(note);
                        LoopState::AwaitApproval
                    } else {
                        LoopState::Verify
                    }
                }
                LoopState::Act => {
                    let batch = self.execute(std::mem::take(&mut requested), patient).await;
                    messages.push(Message::tool_results(&batch));
                    invocations.extend(batch.iter().cloned());
                    last_batch = batch;
                    LoopState::Reason
                }
                LoopState::Verify => match &self.verifier {
                    None => LoopState::Done,
                    Some(verifier) => {
                        let mut result = verifier.verify(&answer, &invocations).await;
                        result.retry_count = retry_count;
                        if result.passed {
                            verification = Some(result);
                            LoopState::Done
                        } else if retry_count == 0 {
                            retry_count = 1;
                            info!("answer failed verification, retrying once");
                            messages.push(Message::user(result.retry_feedback()));
                            let mut kept = result;
                            kept.retry_count = 1;
                            rejected = Some((answer.clone(), kept, messages.len() - 1));
                            last_batch.clear();
                            LoopState::Reason
                        } else {
                            warn!("answer failed verification after retry, returning with caveat");
                            answer.push_str(&result.caveat());
                            verification = Some(result);
                            LoopState::Done
                        }
                    }
                },
                LoopState::AwaitApproval => {
                    info!("draft produced, awaiting clinician approval");
                    LoopState::Done
                }
                LoopState::Done => LoopState::Done,
            };
        }

        Ok(TurnOutcome {
            response: answer,
            messages: messages.split_off(start),
            invocations,
            draft,
            verification,
            iterations,
        })
    }

    /// Sanitizes and runs one batch of tool calls concurrently, keeping order.
    async fn execute(
        &self,
        calls: Vec<ToolCall>,
        patient: Option<&PatientId>,
    ) -> Vec<ToolInvocation> {
        let runs = calls.into_iter().map(|call| async move {
            let param = self.registry.patient_param(&call.name);
            match sanitizer::sanitize(call, param.as_deref(), patient) {
                Sanitized::Ready(call) => {
                    let result = self.registry.invoke(&call).await;
                    ToolInvocation { call, result }
                }
                Sanitized::Rejected(invocation) => invocation,
            }
        });
        futures::future::join_all(runs).await
    }
}

/// The draft carried by the latest tool batch, if any.
fn drafted_note(batch: &[ToolInvocation]) -> Option<ClinicalNote> {
    batch
        .iter()
        .rev()
        .filter(|inv| inv.result.requires_human_confirmation())
        .find_map(|inv| match &inv.result {
            ToolResult::Success(payload) => note_from_draft(payload),
            ToolResult::Error { .. } => None,
        })
}
