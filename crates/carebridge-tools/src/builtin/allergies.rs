// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Allergy intolerances with reactions and criticality.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, EhrAdapter};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema};
use crate::fhir;
use crate::tool::{Tool, success};

pub struct GetAllergiesDetailedTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl GetAllergiesDetailedTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for GetAllergiesDetailedTool {
    fn name(&self) -> &str {
        "get_allergies_detailed"
    }

    fn description(&self) -> &str {
        "Get detailed allergy information for a patient including reactions, \
         severity, criticality, and onset dates."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({}))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let bundle = self.ehr.get_allergies(&patient).await?;
        let records = fhir::allergy_records(&bundle);
        Ok(success(json!({
            "total": records.len(),
            "allergies": records,
        })))
    }
}
