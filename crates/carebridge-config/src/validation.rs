// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: non-empty
//! URLs, positive bounds and TTLs, thresholds in range, known check names.

use crate::diagnostic::ConfigError;
use crate::model::{CarebridgeConfig, KNOWN_CHECKS};

/// Upper bound for `approval.draft_ttl_secs` (30 days).
pub const MAX_DRAFT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound for `session.idle_eviction_secs` (30 days).
pub const MAX_IDLE_EVICTION_SECS: u64 = 30 * 24 * 60 * 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CarebridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let urls = [
        ("anthropic.base_url", &config.anthropic.base_url),
        ("ehr.base_url", &config.ehr.base_url),
        ("ehr.api_url", &config.ehr.api_url),
        ("ehr.fhir_url", &config.ehr.fhir_url),
        ("reference.rxnav_base_url", &config.reference.rxnav_base_url),
        ("reference.icd10_base_url", &config.reference.icd10_base_url),
        ("reference.pubmed_base_url", &config.reference.pubmed_base_url),
    ];
    for (key, value) in urls {
        let value = value.trim();
        if value.is_empty() {
            errors.push(validation(format!("{key} must not be empty")));
        } else if !(value.starts_with("http://") || value.starts_with("https://")) {
            errors.push(validation(format!(
                "{key} `{value}` must start with http:// or https://"
            )));
        }
    }

    if config.agent.max_iterations < 1 {
        errors.push(validation("agent.max_iterations must be at least 1".into()));
    }

    if config.agent.turn_timeout_secs == 0 {
        errors.push(validation(
            "agent.turn_timeout_secs must be greater than 0".into(),
        ));
    }

    if config.reference.tool_timeout_secs == 0 {
        errors.push(validation(
            "reference.tool_timeout_secs must be greater than 0".into(),
        ));
    }

    if config.approval.draft_ttl_secs == 0 {
        errors.push(validation(
            "approval.draft_ttl_secs must be greater than 0".into(),
        ));
    } else if config.approval.draft_ttl_secs > MAX_DRAFT_TTL_SECS {
        errors.push(validation(format!(
            "approval.draft_ttl_secs must be at most {MAX_DRAFT_TTL_SECS} (30 days), got {}",
            config.approval.draft_ttl_secs
        )));
    }

    if config.session.eviction_interval_secs == 0 {
        errors.push(validation(
            "session.eviction_interval_secs must be greater than 0".into(),
        ));
    }

    if config.session.idle_eviction_secs == 0 {
        errors.push(validation(
            "session.idle_eviction_secs must be greater than 0".into(),
        ));
    } else if config.session.idle_eviction_secs > MAX_IDLE_EVICTION_SECS {
        errors.push(validation(format!(
            "session.idle_eviction_secs must be at most {MAX_IDLE_EVICTION_SECS} (30 days), got {}",
            config.session.idle_eviction_secs
        )));
    }

    let threshold = config.verification.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(validation(format!(
            "verification.confidence_threshold must be within [0, 1], got {threshold}"
        )));
    }

    for name in &config.verification.hard_fail_checks {
        if !KNOWN_CHECKS.contains(&name.as_str()) {
            let suggestion = crate::diagnostic::suggest_key(name, KNOWN_CHECKS);
            let hint = suggestion
                .map(|s| format!(" (did you mean `{s}`?)"))
                .unwrap_or_default();
            errors.push(validation(format!(
                "verification.hard_fail_checks contains unknown check `{name}`{hint}; valid checks: {}",
                KNOWN_CHECKS.join(", ")
            )));
        }
    }

    if config.audit.enabled && config.audit.path.trim().is_empty() {
        errors.push(validation(
            "audit.path must not be empty when audit is enabled".into(),
        ));
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(validation("gateway.host must not be empty".into()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
