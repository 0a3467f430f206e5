// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Medication list and drug-drug interaction check.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, DrugReferenceAdapter, EhrAdapter};
use serde_json::json;
use tracing::debug;

use super::{PATIENT_PARAM, patient_arg, patient_schema};
use crate::fhir;
use crate::tool::{Tool, success};

pub struct GetMedicationsTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl GetMedicationsTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for GetMedicationsTool {
    fn name(&self) -> &str {
        "get_medications"
    }

    fn description(&self) -> &str {
        "Get all current medications for a patient from the EHR."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({}))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let bundle = self.ehr.get_medications(&patient).await?;
        Ok(success(json!({
            "medications": fhir::medication_records(&bundle),
        })))
    }
}

/// Resolves each name to an RxNorm ingredient, then checks every resolved
/// pair for known interactions. Names that fail to resolve are reported so
/// the answer never implies a complete check when it was not.
pub struct DrugInteractionCheckTool {
    drugs: Arc<dyn DrugReferenceAdapter>,
}

impl DrugInteractionCheckTool {
    pub fn new(drugs: Arc<dyn DrugReferenceAdapter>) -> Self {
        Self { drugs }
    }
}

#[async_trait]
impl Tool for DrugInteractionCheckTool {
    fn name(&self) -> &str {
        "drug_interaction_check"
    }

    fn description(&self) -> &str {
        "Check for known drug-drug interactions between a list of medications. \
         Drug names are resolved to RxNorm ingredients first; unresolved names are reported."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "drug_names": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Drug names to check, e.g. [\"aspirin\", \"warfarin\"]."
                }
            },
            "required": ["drug_names"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let mut names: Vec<String> = Vec::new();
        for entry in input["drug_names"].as_array().into_iter().flatten() {
            let Some(name) = entry.as_str() else {
                return Err(CarebridgeError::InvalidToolInput {
                    tool: self.name().to_string(),
                    message: format!("drug_names entries must be strings, got {entry}"),
                });
            };
            let name = name.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }

        let resolutions = futures::future::try_join_all(
            names.iter().map(|name| self.drugs.resolve(name)),
        )
        .await?;

        let mut rxcuis: Vec<String> = Vec::new();
        let mut unresolved: Vec<String> = Vec::new();
        let mut by_name = serde_json::Map::new();
        for resolution in &resolutions {
            match &resolution.rxcui {
                Some(rxcui) => {
                    if !rxcuis.contains(rxcui) {
                        rxcuis.push(rxcui.clone());
                    }
                }
                None => unresolved.push(resolution.original_name.clone()),
            }
            by_name.insert(
                resolution.original_name.clone(),
                serde_json::to_value(resolution).unwrap_or_default(),
            );
        }
        debug!(
            requested = names.len(),
            resolved = rxcuis.len(),
            unresolved = unresolved.len(),
            "drug names resolved"
        );

        let interactions = if rxcuis.len() >= 2 {
            self.drugs.interactions(&rxcuis).await?
        } else {
            Vec::new()
        };

        let check_complete = unresolved.is_empty() && rxcuis.len() >= 2;
        let mut data = json!({
            "interactions": interactions,
            "resolutions": by_name,
            "unresolved": unresolved,
            "check_complete": check_complete,
        });
        if !unresolved.is_empty() {
            data["warning"] = json!(format!(
                "WARNING: Could not resolve the following drug(s) to RxNorm concepts: {}. \
                 The interaction check is INCOMPLETE and dangerous interactions may be missed. \
                 Verify these medications manually.",
                unresolved.join(", ")
            ));
        } else if rxcuis.len() < 2 {
            data["note"] = json!("Need at least 2 resolved drugs to check interactions.");
        }
        Ok(success(data))
    }
}
