// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Laboratory results.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, EhrAdapter};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema};
use crate::fhir;
use crate::tool::{Tool, success};

pub struct GetLabResultsTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl GetLabResultsTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for GetLabResultsTool {
    fn name(&self) -> &str {
        "get_lab_results"
    }

    fn description(&self) -> &str {
        "Get laboratory results (Observation resources) for a patient from the EHR."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({}))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let bundle = self.ehr.get_observations(&patient, Some("laboratory")).await?;
        let records = fhir::lab_records(&bundle);
        Ok(success(json!({
            "total": records.len(),
            "lab_results": records,
        })))
    }
}
