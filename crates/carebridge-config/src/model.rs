// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Carebridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Verification check names accepted in `verification.hard_fail_checks`.
pub const KNOWN_CHECKS: &[&str] = &[
    "drug_interactions",
    "hallucination",
    "confidence",
    "output_validation",
];

/// Top-level Carebridge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CarebridgeConfig {
    /// Agent identity and reasoning-loop bounds.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// EHR (OpenEMR) connection settings.
    #[serde(default)]
    pub ehr: EhrConfig,

    /// Public reference-data API settings.
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// Session store settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Approval gate settings.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Verification stage settings.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Agent identity and reasoning-loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on reason/act cycles per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget for a whole turn, in seconds.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            max_iterations: default_max_iterations(),
            turn_timeout_secs: default_turn_timeout_secs(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

fn default_agent_name() -> String {
    "carebridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_turn_timeout_secs() -> u64 {
    120
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model driving the reasoning loop.
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Model used for claim verification.
    #[serde(default = "default_verification_model")]
    pub verification_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Messages API base URL.
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            primary_model: default_primary_model(),
            verification_model: default_verification_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
            base_url: default_anthropic_base_url(),
        }
    }
}

fn default_primary_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_verification_model() -> String {
    "claude-opus-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

/// OpenEMR connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EhrConfig {
    /// Server root, used for OAuth2 registration and token endpoints.
    #[serde(default = "default_ehr_base_url")]
    pub base_url: String,

    /// Standard REST API root.
    #[serde(default = "default_ehr_api_url")]
    pub api_url: String,

    /// FHIR R4 API root.
    #[serde(default = "default_ehr_fhir_url")]
    pub fhir_url: String,

    #[serde(default = "default_ehr_username")]
    pub username: String,

    #[serde(default = "default_ehr_password")]
    pub password: String,

    /// Verify the server's TLS certificate.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Client name sent during dynamic OAuth2 registration.
    #[serde(default = "default_ehr_client_name")]
    pub client_name: String,
}

impl Default for EhrConfig {
    fn default() -> Self {
        Self {
            base_url: default_ehr_base_url(),
            api_url: default_ehr_api_url(),
            fhir_url: default_ehr_fhir_url(),
            username: default_ehr_username(),
            password: default_ehr_password(),
            verify_tls: true,
            client_name: default_ehr_client_name(),
        }
    }
}

fn default_ehr_base_url() -> String {
    "http://openemr:80".to_string()
}

fn default_ehr_api_url() -> String {
    "http://openemr:80/apis/default".to_string()
}

fn default_ehr_fhir_url() -> String {
    "http://openemr:80/apis/default/fhir".to_string()
}

fn default_ehr_username() -> String {
    "admin".to_string()
}

fn default_ehr_password() -> String {
    "pass".to_string()
}

fn default_ehr_client_name() -> String {
    "carebridge".to_string()
}

fn default_true() -> bool {
    true
}

/// Public reference-data API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceConfig {
    #[serde(default = "default_rxnav_base_url")]
    pub rxnav_base_url: String,

    #[serde(default = "default_icd10_base_url")]
    pub icd10_base_url: String,

    #[serde(default = "default_pubmed_base_url")]
    pub pubmed_base_url: String,

    /// Optional NCBI API key; raises the E-utilities rate limit.
    #[serde(default)]
    pub pubmed_api_key: Option<String>,

    /// Per-call timeout applied to every tool invocation, in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            rxnav_base_url: default_rxnav_base_url(),
            icd10_base_url: default_icd10_base_url(),
            pubmed_base_url: default_pubmed_base_url(),
            pubmed_api_key: None,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_rxnav_base_url() -> String {
    "https://rxnav.nlm.nih.gov/REST".to_string()
}

fn default_icd10_base_url() -> String {
    "https://clinicaltables.nlm.nih.gov/api/icd10cm/v3".to_string()
}

fn default_pubmed_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted, in seconds.
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    /// How often the eviction sweeper runs, in seconds.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_eviction_secs: default_idle_eviction_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

fn default_idle_eviction_secs() -> u64 {
    12 * 60 * 60
}

fn default_eviction_interval_secs() -> u64 {
    600
}

/// Approval gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalConfig {
    /// Lifetime of a drafted action before it expires, in seconds.
    #[serde(default = "default_draft_ttl_secs")]
    pub draft_ttl_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            draft_ttl_secs: default_draft_ttl_secs(),
        }
    }
}

fn default_draft_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Verification stage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Checks whose failure forces the single retry.
    #[serde(default = "default_hard_fail_checks")]
    pub hard_fail_checks: Vec<String>,

    /// Confidence scores below this produce a soft finding.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Use the verification model for claim checking instead of heuristics.
    #[serde(default)]
    pub use_model: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_fail_checks: default_hard_fail_checks(),
            confidence_threshold: default_confidence_threshold(),
            use_model: false,
        }
    }
}

fn default_hard_fail_checks() -> Vec<String> {
    vec![
        "drug_interactions".to_string(),
        "output_validation".to_string(),
    ]
}

fn default_confidence_threshold() -> f64 {
    0.5
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path of the append-only JSONL audit file.
    #[serde(default = "default_audit_path")]
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_audit_path(),
        }
    }
}

fn default_audit_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("carebridge").join("audit.jsonl"))
        .unwrap_or_else(|| std::path::PathBuf::from("audit.jsonl"))
        .to_string_lossy()
        .into_owned()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Allow any origin. Intended for local development against a separate UI.
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            cors_permissive: true,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

impl AnthropicConfig {
    /// Resolves the API key: config first, then `ANTHROPIC_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl AgentConfig {
    /// Resolves the system prompt: file first, then inline, else `None`.
    pub fn resolve_system_prompt(&self) -> Result<Option<String>, carebridge_core::CarebridgeError> {
        if let Some(path) = &self.system_prompt_file {
            let content = std::fs::read_to_string(path).map_err(|e| {
                carebridge_core::CarebridgeError::Config(format!(
                    "failed to read system_prompt_file {path}: {e}"
                ))
            })?;
            return Ok(Some(content));
        }
        Ok(self.system_prompt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CarebridgeConfig::default();
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.approval.draft_ttl_secs, 86_400);
        assert_eq!(config.session.idle_eviction_secs, 43_200);
        assert_eq!(config.reference.tool_timeout_secs, 30);
        assert_eq!(config.gateway.port, 8000);
        assert!((config.verification.confidence_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(
            config.verification.hard_fail_checks,
            vec!["drug_interactions", "output_validation"]
        );
    }

    #[test]
    fn configured_api_key_wins() {
        let config = AnthropicConfig {
            api_key: Some("sk-from-config".into()),
            ..AnthropicConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-from-config"));
    }

    #[test]
    fn system_prompt_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "from file").unwrap();
        let config = AgentConfig {
            system_prompt: Some("inline".into()),
            system_prompt_file: Some(path.display().to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(
            config.resolve_system_prompt().unwrap().as_deref(),
            Some("from file")
        );
    }

    #[test]
    fn missing_system_prompt_file_is_config_error() {
        let config = AgentConfig {
            system_prompt_file: Some("/nonexistent/prompt.md".into()),
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.resolve_system_prompt(),
            Err(carebridge_core::CarebridgeError::Config(_))
        ));
    }
}
