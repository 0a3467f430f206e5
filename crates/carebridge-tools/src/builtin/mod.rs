// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in clinical tools.
//!
//! Six patient-scoped EHR readers, four reference lookups that never touch
//! patient data, and the note-drafting tool whose output is gated behind
//! clinician approval.

pub mod allergies;
pub mod appointments;
pub mod clinical_notes;
pub mod icd10;
pub mod labs;
pub mod medications;
pub mod patient;
pub mod pubmed;
pub mod vitals;

pub use allergies::GetAllergiesDetailedTool;
pub use appointments::GetAppointmentsTool;
pub use clinical_notes::{CreateClinicalNoteTool, DRAFT_MESSAGE, VALID_NOTE_TYPES, note_from_draft};
pub use icd10::Icd10LookupTool;
pub use labs::GetLabResultsTool;
pub use medications::{DrugInteractionCheckTool, GetMedicationsTool};
pub use patient::{GetPatientSummaryTool, SearchPatientsTool};
pub use pubmed::PubMedSearchTool;
pub use vitals::GetVitalsTool;

use std::sync::Arc;

use carebridge_core::{
    CarebridgeError, Clock, DrugReferenceAdapter, EhrAdapter, Icd10Adapter, LiteratureAdapter,
    PatientId,
};

use crate::ToolRegistry;

/// Name of the patient parameter every patient-scoped tool declares.
pub const PATIENT_PARAM: &str = "patient_uuid";

/// External collaborators the built-in tools are backed by.
#[derive(Clone)]
pub struct ClinicalCollaborators {
    pub ehr: Arc<dyn EhrAdapter>,
    pub drugs: Arc<dyn DrugReferenceAdapter>,
    pub icd10: Arc<dyn Icd10Adapter>,
    pub literature: Arc<dyn LiteratureAdapter>,
    pub clock: Arc<dyn Clock>,
}

/// Registers all eleven clinical tools into the given registry.
pub fn register_clinical_tools(
    registry: &mut ToolRegistry,
    c: &ClinicalCollaborators,
) -> Result<(), CarebridgeError> {
    registry.register(Arc::new(GetPatientSummaryTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(SearchPatientsTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(GetMedicationsTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(DrugInteractionCheckTool::new(c.drugs.clone())))?;
    registry.register(Arc::new(GetLabResultsTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(GetVitalsTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(GetAllergiesDetailedTool::new(c.ehr.clone())))?;
    registry.register(Arc::new(GetAppointmentsTool::new(
        c.ehr.clone(),
        c.clock.clone(),
    )))?;
    registry.register(Arc::new(Icd10LookupTool::new(c.icd10.clone())))?;
    registry.register(Arc::new(PubMedSearchTool::new(c.literature.clone())))?;
    registry.register(Arc::new(CreateClinicalNoteTool::new(c.clock.clone())))?;
    Ok(())
}

/// Input schema with a required `patient_uuid` plus any extra properties.
pub(crate) fn patient_schema(extra: serde_json::Value) -> serde_json::Value {
    let mut properties = serde_json::json!({
        PATIENT_PARAM: {
            "type": "string",
            "description": "The UUID of the patient in the EHR."
        }
    });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": [PATIENT_PARAM]
    })
}

pub(crate) fn patient_arg(tool: &str, input: &serde_json::Value) -> Result<PatientId, CarebridgeError> {
    str_arg(tool, input, PATIENT_PARAM).map(|s| PatientId(s.to_string()))
}

pub(crate) fn str_arg<'a>(
    tool: &str,
    input: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, CarebridgeError> {
    input[field]
        .as_str()
        .ok_or_else(|| CarebridgeError::InvalidToolInput {
            tool: tool.to_string(),
            message: format!("missing required field '{field}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_schema_merges_extra_properties() {
        let schema = patient_schema(serde_json::json!({
            "date_range": {"type": "string", "enum": ["upcoming", "all"]}
        }));
        assert_eq!(schema["required"][0], PATIENT_PARAM);
        assert_eq!(schema["properties"][PATIENT_PARAM]["type"], "string");
        assert_eq!(schema["properties"]["date_range"]["enum"][1], "all");
    }

    #[test]
    fn str_arg_reports_missing_field() {
        let err = str_arg("icd10_lookup", &serde_json::json!({}), "query").unwrap_err();
        assert!(err.to_string().contains("query"));
    }
}
