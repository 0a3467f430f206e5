// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hard/soft split of the verification checks.

use std::collections::HashSet;
use std::str::FromStr;

use carebridge_config::model::VerificationConfig;
use tracing::warn;

use crate::finding::CheckName;

#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    hard_fail: HashSet<CheckName>,
    pub confidence_threshold: f64,
}

impl VerificationPolicy {
    pub fn new(hard_fail: impl IntoIterator<Item = CheckName>, confidence_threshold: f64) -> Self {
        Self {
            hard_fail: hard_fail.into_iter().collect(),
            confidence_threshold,
        }
    }

    /// Builds the policy from config. Unknown names are rejected by config
    /// validation; any that slip through are ignored with a warning.
    pub fn from_config(config: &VerificationConfig) -> Self {
        let hard_fail = config
            .hard_fail_checks
            .iter()
            .filter_map(|name| match CheckName::from_str(name) {
                Ok(check) => Some(check),
                Err(_) => {
                    warn!(check = %name, "ignoring unknown hard-fail check");
                    None
                }
            });
        Self::new(hard_fail, config.confidence_threshold)
    }

    pub fn is_hard_fail(&self, check: CheckName) -> bool {
        self.hard_fail.contains(&check)
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::new(
            [CheckName::DrugInteractions, CheckName::OutputValidation],
            0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_hard_fails_drugs_and_output() {
        let policy = VerificationPolicy::default();
        assert!(policy.is_hard_fail(CheckName::DrugInteractions));
        assert!(policy.is_hard_fail(CheckName::OutputValidation));
        assert!(!policy.is_hard_fail(CheckName::Hallucination));
        assert!(!policy.is_hard_fail(CheckName::Confidence));
    }

    #[test]
    fn config_can_promote_soft_checks() {
        let config = VerificationConfig {
            hard_fail_checks: vec!["hallucination".into(), "bogus".into()],
            confidence_threshold: 0.7,
            ..VerificationConfig::default()
        };
        let policy = VerificationPolicy::from_config(&config);
        assert!(policy.is_hard_fail(CheckName::Hallucination));
        assert!(!policy.is_hard_fail(CheckName::DrugInteractions));
        assert_eq!(policy.confidence_threshold, 0.7);
    }
}
