// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vital signs.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, EhrAdapter};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema};
use crate::fhir;
use crate::tool::{Tool, success};

pub struct GetVitalsTool {
    ehr: Arc<dyn EhrAdapter>,
}

impl GetVitalsTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>) -> Self {
        Self { ehr }
    }
}

#[async_trait]
impl Tool for GetVitalsTool {
    fn name(&self) -> &str {
        "get_vitals"
    }

    fn description(&self) -> &str {
        "Get the most recent vital signs for a patient including blood pressure, \
         heart rate, temperature, weight, and BMI."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({}))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let bundle = self.ehr.get_observations(&patient, Some("vital-signs")).await?;
        let records = fhir::vital_records(&bundle);
        Ok(success(json!({
            "total": records.len(),
            "vitals": records,
        })))
    }
}
