// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Patient summary and patient search.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, EhrAdapter};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema, str_arg};
use crate::fhir;
use crate::tool::{Tool, success};

/// Demographics, conditions, medications, allergies, and recent vitals in one call.
pub struct GetPatientSummaryTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl GetPatientSummaryTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for GetPatientSummaryTool {
    fn name(&self) -> &str {
        "get_patient_summary"
    }

    fn description(&self) -> &str {
        "Get a comprehensive summary for a patient including demographics, conditions, \
         medications, allergies, and recent vitals."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({}))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let (demographics, conditions, medications, allergies, vitals) = futures::try_join!(
            self.ehr.get_patient(&patient),
            self.ehr.get_conditions(&patient),
            self.ehr.get_medications(&patient),
            self.ehr.get_allergies(&patient),
            self.ehr.get_observations(&patient, Some("vital-signs")),
        )?;

        Ok(success(json!({
            "patient": demographics,
            "conditions": fhir::condition_records(&conditions),
            "medications": fhir::medication_records(&medications),
            "allergies": fhir::allergy_records(&allergies),
            "vitals": fhir::vital_records(&vitals),
        })))
    }
}

/// Name search across the EHR. Not patient-scoped: it is how a patient is found.
pub struct SearchPatientsTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl SearchPatientsTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for SearchPatientsTool {
    fn name(&self) -> &str {
        "search_patients"
    }

    fn description(&self) -> &str {
        "Search for patients by name in the EHR."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The patient name (or partial name) to search for."
                }
            },
            "required": ["name"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let name = str_arg(self.name(), &input, "name")?;
        let bundle = self.ehr.search_patients(name).await?;
        let patients = fhir::patient_records(&bundle);
        Ok(success(json!({
            "total": patients.len(),
            "patients": patients,
        })))
    }
}
