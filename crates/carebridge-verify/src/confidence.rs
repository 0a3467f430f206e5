// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic confidence score.

use std::sync::LazyLock;

use regex::Regex;

use crate::evidence::TurnEvidence;
use crate::finding::{CheckName, Finding};
use crate::output::has_source_attribution;

const TOOL_USE_WEIGHT: f64 = 0.3;
const DATA_COMPLETENESS_WEIGHT: f64 = 0.3;
const RESPONSE_QUALITY_WEIGHT: f64 = 0.2;
const NO_ERRORS_WEIGHT: f64 = 0.2;

const ATTRIBUTION_BONUS: f64 = 0.05;
const HEDGE_PENALTY: f64 = 0.05;
const MAX_HEDGE_PENALTY: f64 = 0.15;

static HEDGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:i think|i believe|probably|possibly|might be|may be|not sure|unclear|it seems|likely)\b",
    )
    .expect("valid regex")
});

/// Score in [0, 1], rounded to three decimals.
pub fn score(evidence: &TurnEvidence<'_>) -> f64 {
    let tool_count = evidence.invocations.len();
    let has_errors = evidence.has_errors();
    let has_data = evidence.has_tool_data();
    let length = evidence.answer.trim().chars().count();

    let tool_score = match tool_count {
        0 => 0.2,
        1 => 0.6,
        _ => 1.0,
    };
    let data_score = match (has_data, has_errors) {
        (true, false) => 1.0,
        (true, true) => 0.5,
        (false, _) => 0.3,
    };
    let quality_score = if length > 200 {
        1.0
    } else if length > 50 {
        0.6
    } else {
        0.3
    };
    let error_score = if has_errors { 0.3 } else { 1.0 };

    let mut total = tool_score * TOOL_USE_WEIGHT
        + data_score * DATA_COMPLETENESS_WEIGHT
        + quality_score * RESPONSE_QUALITY_WEIGHT
        + error_score * NO_ERRORS_WEIGHT;

    if has_source_attribution(evidence) {
        total += ATTRIBUTION_BONUS;
    }
    let hedges = HEDGING.find_iter(evidence.answer).count() as f64;
    total -= (hedges * HEDGE_PENALTY).min(MAX_HEDGE_PENALTY);

    (total.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

pub fn check(evidence: &TurnEvidence<'_>, threshold: f64) -> Finding {
    let score = score(evidence);
    let finding = if score >= threshold {
        Finding::pass(
            CheckName::Confidence,
            format!("Confidence score {score:.2} meets threshold {threshold}."),
        )
    } else {
        Finding::fail(
            CheckName::Confidence,
            format!(
                "Confidence score {score:.2} below threshold {threshold}. \
                 Response may lack sufficient data backing."
            ),
            Vec::new(),
        )
    };
    finding.with_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebridge_core::{ToolCall, ToolInvocation, ToolResult};
    use serde_json::json;

    fn call(name: &str, result: ToolResult) -> ToolInvocation {
        ToolInvocation {
            call: ToolCall {
                id: format!("tu_{name}"),
                name: name.into(),
                args: json!({}),
            },
            result,
        }
    }

    #[test]
    fn bare_greeting_scores_low() {
        let evidence = TurnEvidence::new("Hello! How can I help?", &[]);
        // 0.2*0.3 + 0.3*0.3 + 0.3*0.2 + 1.0*0.2
        assert_eq!(score(&evidence), 0.41);
        assert!(!check(&evidence, 0.5).passed());
    }

    #[test]
    fn well_sourced_answer_scores_high() {
        let invocations = vec![
            call("get_medications", ToolResult::Success(json!({"status": "success"}))),
            call("get_allergies_detailed", ToolResult::Success(json!({"status": "success"}))),
        ];
        let answer = format!(
            "{}\n\nSource: get_medications, get_allergies_detailed",
            "The patient has three active prescriptions and a documented penicillin allergy. ".repeat(3)
        );
        let evidence = TurnEvidence::new(&answer, &invocations);
        assert_eq!(score(&evidence), 1.0);
    }

    #[test]
    fn tool_errors_and_hedging_reduce_score() {
        let invocations = vec![call("get_lab_results", ToolResult::error("Tool 'get_lab_results' timed out. Try again."))];
        let evidence = TurnEvidence::new(
            "I think the labs are probably normal but it is unclear without the results.",
            &invocations,
        );
        let finding = check(&evidence, 0.5);
        assert!(!finding.passed());
        assert!(finding.score.unwrap() < 0.4);
    }
}
