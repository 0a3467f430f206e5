// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification findings and the combined result.

use serde::Serialize;
use strum::{Display, EnumString};

/// The verification checks, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckName {
    DrugInteractions,
    Hallucination,
    Confidence,
    OutputValidation,
}

impl CheckName {
    pub const ALL: [CheckName; 4] = [
        CheckName::DrugInteractions,
        CheckName::Hallucination,
        CheckName::Confidence,
        CheckName::OutputValidation,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FindingStatus {
    Pass,
    Fail,
}

/// How the claim check reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClaimCheckMode {
    /// Confirmed by the secondary verification model.
    Model,
    /// Heuristic number matching only.
    Heuristic,
    /// The model was configured but failed; heuristic verdict used instead.
    HeuristicFallback,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub check: CheckName,
    pub status: FindingStatus,
    pub detail: String,
    /// Whether a failure of this check forces a retry under the active policy.
    pub hard_fail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ClaimCheckMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Offending items (unchecked drugs, unsupported claims, output issues).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl Finding {
    pub fn pass(check: CheckName, detail: impl Into<String>) -> Self {
        Self {
            check,
            status: FindingStatus::Pass,
            detail: detail.into(),
            hard_fail: false,
            mode: None,
            score: None,
            items: Vec::new(),
        }
    }

    pub fn fail(check: CheckName, detail: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            status: FindingStatus::Fail,
            items,
            ..Self::pass(check, detail)
        }
    }

    pub fn with_mode(mut self, mode: ClaimCheckMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn passed(&self) -> bool {
        self.status == FindingStatus::Pass
    }

    /// A failed finding that blocks the answer.
    pub fn is_blocking(&self) -> bool {
        self.hard_fail && !self.passed()
    }
}

/// Combined outcome of all checks for one candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub findings: Vec<Finding>,
    /// Reasoning-loop retries spent on this turn, 0 or 1.
    pub retry_count: u8,
}

impl VerificationResult {
    /// Result used when verification is disabled.
    pub fn skipped() -> Self {
        Self {
            passed: true,
            findings: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_blocking())
    }

    /// Feedback appended to the transcript before the single retry.
    pub fn retry_feedback(&self) -> String {
        let mut out = String::from(
            "Your previous answer failed verification. Revise it to address these findings:\n",
        );
        for f in self.blocking() {
            out.push_str(&format!("- {}: {}", f.check, f.detail));
            if !f.items.is_empty() {
                out.push_str(&format!(" ({})", f.items.join("; ")));
            }
            out.push('\n');
        }
        out
    }

    /// Annotation appended to an answer that still fails after the retry.
    pub fn caveat(&self) -> String {
        let failed: Vec<String> = self.blocking().map(|f| f.check.to_string()).collect();
        format!(
            "\n\n---\nCaveat: this answer could not be fully verified (failed checks: {}). \
             Confirm the details against the patient record before acting on them.",
            failed.join(", ")
        )
    }
}
