// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Patient appointments, optionally limited to upcoming ones.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, Clock, EhrAdapter};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema};
use crate::fhir;
use crate::tool::{Tool, success};

pub struct GetAppointmentsTool {
    ehr: Arc<dyn EhrAdapter>,
    clock: Arc<dyn Clock>,
}

impl GetAppointmentsTool {
    pub fn new(ehr: Arc<dyn EhrAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { ehr, clock }
    }
}

#[async_trait]
impl Tool for GetAppointmentsTool {
    fn name(&self) -> &str {
        "get_appointments"
    }

    fn description(&self) -> &str {
        "Get appointments for a patient from the EHR. date_range is \"upcoming\" (default) or \"all\"."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        patient_schema(json!({
            "date_range": {
                "type": "string",
                "enum": ["upcoming", "all"],
                "description": "Filter for appointments: \"upcoming\" (default) or \"all\"."
            }
        }))
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let date_range = input["date_range"].as_str().unwrap_or("upcoming");
        let bundle = self.ehr.get_appointments(&patient).await?;

        let mut appointments = fhir::appointment_records(&bundle);
        if date_range == "upcoming" {
            // ISO dates compare correctly as strings; undated entries are kept.
            let today = self.clock.now().date_naive().to_string();
            appointments.retain(|a| {
                let date = a["date"].as_str().unwrap_or_default();
                date.is_empty() || date >= today.as_str()
            });
        }

        Ok(success(json!({
            "date_range": date_range,
            "total": appointments.len(),
            "appointments": appointments,
        })))
    }
}
