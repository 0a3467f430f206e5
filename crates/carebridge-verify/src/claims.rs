// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hallucination check: clinical values in the answer must be backed by
//! data the tools returned this turn.
//!
//! The heuristic pass extracts every line carrying a number with a clinical
//! unit and flags those whose numbers never appear in tool data. When a
//! verification model is configured, flagged claims are sent to it and only
//! the ones it confirms as unsupported are kept.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, Message, ProviderAdapter, ProviderRequest};
use regex::Regex;
use tracing::{debug, warn};

use crate::evidence::TurnEvidence;
use crate::finding::{CheckName, ClaimCheckMode, Finding};

static CLAIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:\.\d+)?\s*(?:mg/dL|g/dL|U/L|IU/L|mEq/L|cells/mcL|mmol|mmHg|mcg|mg|mL|bpm|kg|lb|%)",
    )
    .expect("valid regex")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));

/// Lines of `text` asserting a concrete clinical value.
pub fn extract_claims(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| CLAIM.is_match(line))
        .map(str::to_string)
        .collect()
}

fn numbers(text: &str) -> Vec<String> {
    NUMBER
        .find_iter(text)
        .map(|m| normalize_number(m.as_str()))
        .collect()
}

/// "7.20" and "7.2" compare equal.
fn normalize_number(raw: &str) -> String {
    if raw.contains('.') {
        let trimmed = raw.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        raw.to_string()
    }
}

fn supported(claim: &str, known: &HashSet<String>) -> bool {
    let nums = numbers(claim);
    nums.is_empty() || nums.iter().any(|n| known.contains(n))
}

/// Verdict of a claim checker over heuristically flagged claims.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimVerdict {
    pub unsupported: Vec<String>,
    pub mode: ClaimCheckMode,
}

/// Decides which heuristically flagged claims are really unsupported.
#[async_trait]
pub trait ClaimChecker: Send + Sync {
    async fn review(&self, flagged: Vec<String>, tool_data: &str) -> ClaimVerdict;
}

/// Keeps every flagged claim.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicClaimChecker;

#[async_trait]
impl ClaimChecker for HeuristicClaimChecker {
    async fn review(&self, flagged: Vec<String>, _tool_data: &str) -> ClaimVerdict {
        ClaimVerdict {
            unsupported: flagged,
            mode: ClaimCheckMode::Heuristic,
        }
    }
}

/// Asks a secondary model to judge the flagged claims.
pub struct ModelClaimChecker {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
}

impl ModelClaimChecker {
    pub fn new(provider: Arc<dyn ProviderAdapter>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn ask(&self, flagged: &[String], tool_data: &str) -> Result<String, CarebridgeError> {
        let prompt = format!(
            "You are a clinical data verification agent. Check whether the following claims \
             from an assistant's response are supported by the tool output data.\n\n\
             Tool data:\n{tool_data}\n\nFlagged claims:\n{}\n\n\
             Return only the unsupported claims, one per line. \
             If all are supported, respond with 'ALL_SUPPORTED'.",
            flagged.join("\n")
        );
        let response = self
            .provider
            .complete(ProviderRequest {
                model: self.model.clone(),
                system_prompt: None,
                messages: vec![Message::user(prompt)],
                tools: Vec::new(),
                max_tokens: 1024,
            })
            .await?;
        Ok(response.text())
    }
}

#[async_trait]
impl ClaimChecker for ModelClaimChecker {
    async fn review(&self, flagged: Vec<String>, tool_data: &str) -> ClaimVerdict {
        match self.ask(&flagged, tool_data).await {
            Ok(reply) if reply.contains("ALL_SUPPORTED") => ClaimVerdict {
                unsupported: Vec::new(),
                mode: ClaimCheckMode::Model,
            },
            Ok(reply) => {
                let reply_numbers: HashSet<String> = numbers(&reply).into_iter().collect();
                let confirmed: Vec<String> = flagged
                    .iter()
                    .filter(|claim| numbers(claim).iter().any(|n| reply_numbers.contains(n)))
                    .cloned()
                    .collect();
                // A reply naming nothing recognizable is not an acquittal.
                let unsupported = if confirmed.is_empty() { flagged } else { confirmed };
                ClaimVerdict {
                    unsupported,
                    mode: ClaimCheckMode::Model,
                }
            }
            Err(e) => {
                warn!(error = %e, "verification model call failed, using heuristic verdict");
                ClaimVerdict {
                    unsupported: flagged,
                    mode: ClaimCheckMode::HeuristicFallback,
                }
            }
        }
    }
}

pub async fn check(evidence: &TurnEvidence<'_>, checker: &dyn ClaimChecker) -> Finding {
    let claims = extract_claims(evidence.answer);
    if claims.is_empty() {
        return Finding::pass(CheckName::Hallucination, "No concrete clinical values asserted.")
            .with_mode(ClaimCheckMode::Heuristic);
    }

    if !evidence.has_tool_data() {
        return Finding::fail(
            CheckName::Hallucination,
            "Response contains clinical values but no tool data was retrieved to verify them.",
            claims,
        )
        .with_mode(ClaimCheckMode::Heuristic);
    }

    let tool_data = evidence.tool_data_text();
    let known: HashSet<String> = numbers(&tool_data).into_iter().collect();
    let flagged: Vec<String> = claims
        .into_iter()
        .filter(|claim| !supported(claim, &known))
        .collect();
    if flagged.is_empty() {
        return Finding::pass(
            CheckName::Hallucination,
            "All clinical values match tool data.",
        )
        .with_mode(ClaimCheckMode::Heuristic);
    }

    debug!(flagged = flagged.len(), "claims not matched by tool data");
    let verdict = checker.review(flagged, &tool_data).await;
    if verdict.unsupported.is_empty() {
        Finding::pass(
            CheckName::Hallucination,
            "All clinical values are supported by tool data.",
        )
        .with_mode(verdict.mode)
    } else {
        Finding::fail(
            CheckName::Hallucination,
            format!(
                "{} claim(s) could not be verified against tool output data.",
                verdict.unsupported.len()
            ),
            verdict.unsupported,
        )
        .with_mode(verdict.mode)
    }
}
