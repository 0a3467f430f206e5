// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural and safety checks on the final answer text.

use std::sync::LazyLock;

use regex::Regex;

use crate::evidence::TurnEvidence;
use crate::finding::{CheckName, Finding};

static RAW_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\{\s*"(?:resourceType|status|entry|error)""#).expect("valid regex")
});

static SWALLOWED_ERRORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Tool '\w+' failed:").expect("valid regex"),
        Regex::new(r"(?i)Tool '\w+' timed out").expect("valid regex"),
        Regex::new(r"(?i)\b(?:ConnectionError|TimeoutError|reqwest::Error):").expect("valid regex"),
    ]
});

static SYSTEM_LEAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:<\s*/?\s*system\s*>|\bsystem prompt\b|\[/?INST\]|BEGIN SYSTEM|ACTIVE PATIENT CONTEXT)")
        .expect("valid regex")
});

static SOURCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*[*_]*sources?[*_]*\s*:").expect("valid regex"));

/// True when the answer names where its data came from: a `Source:` line or
/// the name of a tool that returned data this turn.
pub fn has_source_attribution(evidence: &TurnEvidence<'_>) -> bool {
    SOURCE_LINE.is_match(evidence.answer)
        || evidence
            .successes()
            .any(|(tool, _)| evidence.answer.contains(tool))
}

pub fn check(evidence: &TurnEvidence<'_>) -> Finding {
    if evidence.answer.trim().is_empty() {
        return Finding::fail(
            CheckName::OutputValidation,
            "Response is empty.",
            vec!["Response is empty.".to_string()],
        );
    }

    let mut issues = Vec::new();
    if RAW_JSON.is_match(evidence.answer) {
        issues.push("Response contains raw JSON/API data.".to_string());
    }
    if let Some(pattern) = SWALLOWED_ERRORS.iter().find(|p| p.is_match(evidence.answer)) {
        issues.push(format!(
            "Response contains tool error message: {}",
            pattern.as_str()
        ));
    }
    if SYSTEM_LEAK.is_match(evidence.answer) {
        issues.push("Response exposes system instructions.".to_string());
    }
    if evidence.has_tool_data() && !has_source_attribution(evidence) {
        issues.push("Response uses tool data but has no source attribution.".to_string());
    }

    if issues.is_empty() {
        Finding::pass(CheckName::OutputValidation, "Output is well-formed.")
    } else {
        Finding::fail(
            CheckName::OutputValidation,
            format!("{} output issue(s) found.", issues.len()),
            issues,
        )
    }
}
