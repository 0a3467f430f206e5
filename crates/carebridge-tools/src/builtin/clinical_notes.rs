// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clinical note drafting.
//!
//! This tool never writes to the EHR. It returns a draft marked
//! `requires_human_confirmation`; the write happens only when a clinician
//! approves the draft.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, ClinicalNote, Clock, PatientId};
use serde_json::json;

use super::{PATIENT_PARAM, patient_arg, patient_schema, str_arg};
use crate::tool::{Tool, success};

/// Note types the EHR accepts.
pub const VALID_NOTE_TYPES: [&str; 5] = ["Consultation", "Discharge", "Procedure", "Progress", "SOAP"];

pub const DRAFT_MESSAGE: &str = "This is a DRAFT clinical note. It must be reviewed and approved \
     by a clinician before being saved to the patient record.";

pub struct CreateClinicalNoteTool {
    clock: Arc<dyn Clock>,
}

impl CreateClinicalNoteTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for CreateClinicalNoteTool {
    fn name(&self) -> &str {
        "create_clinical_note"
    }

    fn description(&self) -> &str {
        "Draft a clinical note for clinician review. This does NOT save the note: it returns \
         a draft that must be approved by a clinician before being committed to the patient record."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let mut schema = patient_schema(json!({
            "note_type": {
                "type": "string",
                "enum": VALID_NOTE_TYPES,
                "description": "Type of clinical note."
            },
            "content": {
                "type": "string",
                "description": "The clinical note content."
            }
        }));
        schema["required"] = json!([PATIENT_PARAM, "note_type", "content"]);
        schema
    }

    fn patient_param(&self) -> Option<&str> {
        Some(PATIENT_PARAM)
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let patient = patient_arg(self.name(), &input)?;
        let note_type = str_arg(self.name(), &input, "note_type")?;
        let content = str_arg(self.name(), &input, "content")?.trim();

        if !VALID_NOTE_TYPES.contains(&note_type) {
            return Err(CarebridgeError::InvalidToolInput {
                tool: self.name().to_string(),
                message: format!(
                    "invalid note_type '{note_type}', must be one of: {}",
                    VALID_NOTE_TYPES.join(", ")
                ),
            });
        }
        if content.is_empty() {
            return Err(CarebridgeError::InvalidToolInput {
                tool: self.name().to_string(),
                message: "note content cannot be empty".to_string(),
            });
        }

        Ok(success(json!({
            "draft": {
                "patient_uuid": patient,
                "note_type": note_type,
                "content": content,
                "created_at": self.clock.now().to_rfc3339(),
            },
            "requires_human_confirmation": true,
            "message": DRAFT_MESSAGE,
        })))
    }
}

/// Recovers the note from a draft payload produced by [`CreateClinicalNoteTool`].
pub fn note_from_draft(payload: &serde_json::Value) -> Option<ClinicalNote> {
    let draft = &payload["data"]["draft"];
    Some(ClinicalNote {
        patient_uuid: PatientId(draft["patient_uuid"].as_str()?.to_string()),
        note_type: draft["note_type"].as_str()?.to_string(),
        content: draft["content"].as_str()?.to_string(),
    })
}
