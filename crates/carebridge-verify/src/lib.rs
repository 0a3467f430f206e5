// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification stage for the Carebridge agent.
//!
//! A candidate answer is checked against the tool results gathered during
//! the turn. Four checks run in a fixed order: drug-interaction coverage,
//! claim support, confidence, and output validation. The
//! [`VerificationPolicy`] decides which failures block the answer.

pub mod claims;
pub mod confidence;
pub mod drugs;
pub mod evidence;
pub mod finding;
pub mod output;
pub mod policy;

use std::sync::Arc;

use carebridge_config::model::VerificationConfig;
use carebridge_core::{ProviderAdapter, ToolInvocation};
use tracing::{debug, warn};

pub use claims::{ClaimChecker, HeuristicClaimChecker, ModelClaimChecker};
pub use evidence::TurnEvidence;
pub use finding::{CheckName, ClaimCheckMode, Finding, FindingStatus, VerificationResult};
pub use policy::VerificationPolicy;

/// Runs the verification checks under a policy.
pub struct Verifier {
    policy: VerificationPolicy,
    claims: Arc<dyn ClaimChecker>,
}

impl Verifier {
    pub fn new(policy: VerificationPolicy, claims: Arc<dyn ClaimChecker>) -> Self {
        Self { policy, claims }
    }

    /// Heuristic-only verifier with the default policy.
    pub fn heuristic() -> Self {
        Self::new(VerificationPolicy::default(), Arc::new(HeuristicClaimChecker))
    }

    /// Selects model-backed or heuristic claim checking from config.
    pub fn from_config(
        config: &VerificationConfig,
        provider: Arc<dyn ProviderAdapter>,
        verification_model: &str,
    ) -> Self {
        let claims: Arc<dyn ClaimChecker> = if config.use_model {
            Arc::new(ModelClaimChecker::new(provider, verification_model))
        } else {
            Arc::new(HeuristicClaimChecker)
        };
        Self::new(VerificationPolicy::from_config(config), claims)
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    pub async fn verify(&self, answer: &str, invocations: &[ToolInvocation]) -> VerificationResult {
        let evidence = TurnEvidence::new(answer, invocations);
        let mut findings = vec![
            drugs::check(&evidence),
            claims::check(&evidence, self.claims.as_ref()).await,
            confidence::check(&evidence, self.policy.confidence_threshold),
            output::check(&evidence),
        ];
        for finding in &mut findings {
            finding.hard_fail = self.policy.is_hard_fail(finding.check);
        }

        let passed = !findings.iter().any(Finding::is_blocking);
        if passed {
            debug!(findings = findings.len(), "verification passed");
        } else {
            let failed: Vec<String> = findings
                .iter()
                .filter(|f| f.is_blocking())
                .map(|f| f.check.to_string())
                .collect();
            warn!(failed = ?failed, "verification failed");
        }

        VerificationResult {
            passed,
            findings,
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebridge_core::{ToolCall, ToolResult};
    use serde_json::json;

    #[tokio::test]
    async fn findings_run_in_fixed_order() {
        let result = Verifier::heuristic().verify("Hello.", &[]).await;
        let order: Vec<CheckName> = result.findings.iter().map(|f| f.check).collect();
        assert_eq!(order, CheckName::ALL.to_vec());
    }

    #[tokio::test]
    async fn soft_failures_do_not_block() {
        // Low confidence only.
        let result = Verifier::heuristic().verify("Hello.", &[]).await;
        assert!(result.passed);
        let confidence = &result.findings[2];
        assert!(!confidence.passed());
        assert!(!confidence.hard_fail);
    }

    #[tokio::test]
    async fn unchecked_drug_combination_blocks() {
        let result = Verifier::heuristic()
            .verify("Warfarin and aspirin can be taken together safely.", &[])
            .await;
        assert!(!result.passed);
        assert_eq!(result.blocking().next().unwrap().check, CheckName::DrugInteractions);
    }

    #[tokio::test]
    async fn promoted_soft_check_blocks() {
        let verifier = Verifier::new(
            VerificationPolicy::new([CheckName::Hallucination], 0.5),
            Arc::new(HeuristicClaimChecker),
        );
        let invocations = vec![ToolInvocation {
            call: ToolCall {
                id: "tu_1".into(),
                name: "get_lab_results".into(),
                args: json!({}),
            },
            result: ToolResult::Success(json!({"data": {"lab_results": [{"value": 6.1}]}})),
        }];
        let result = verifier
            .verify("HbA1c is 9.4%.\nSource: get_lab_results", &invocations)
            .await;
        assert!(!result.passed);
    }
}
