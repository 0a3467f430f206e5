// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory EHR with fixture patients.
//!
//! Serves FHIR-shaped bundles per patient, records every call with the
//! patient it was made for, and keeps the notes written through the
//! approval gate so tests can count them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use carebridge_core::{
    AdapterType, CarebridgeError, ClinicalNote, EhrAdapter, HealthStatus, PatientId,
    PluginAdapter,
};

/// FHIR resources served for one patient.
#[derive(Debug, Clone)]
pub struct PatientFixture {
    pub patient: Value,
    pub conditions: Vec<Value>,
    pub medications: Vec<Value>,
    pub labs: Vec<Value>,
    pub vitals: Vec<Value>,
    pub allergies: Vec<Value>,
    pub appointments: Vec<Value>,
}

/// One recorded EHR call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EhrCall {
    pub operation: &'static str,
    pub patient: Option<String>,
}

/// Wraps resources in a FHIR searchset bundle.
pub fn bundle(resources: &[Value]) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": resources.len(),
        "entry": resources.iter().map(|r| json!({"resource": r})).collect::<Vec<_>>(),
    })
}

fn medication(text: &str) -> Value {
    json!({
        "resourceType": "MedicationRequest",
        "status": "active",
        "intent": "order",
        "medicationCodeableConcept": {"text": text},
    })
}

fn observation(category: &str, text: &str, value: f64, unit: &str, date: &str) -> Value {
    json!({
        "resourceType": "Observation",
        "status": "final",
        "category": [{"coding": [{"code": category}]}],
        "code": {"text": text},
        "valueQuantity": {"value": value, "unit": unit},
        "effectiveDateTime": date,
    })
}

fn condition(text: &str, onset: &str) -> Value {
    json!({
        "resourceType": "Condition",
        "code": {"text": text},
        "clinicalStatus": {"coding": [{"code": "active"}]},
        "onsetDateTime": onset,
    })
}

fn appointment(start: &str, practitioner: &str, reason: &str, status: &str) -> Value {
    json!({
        "resourceType": "Appointment",
        "start": start,
        "status": status,
        "reasonCode": [{"text": reason}],
        "participant": [
            {"actor": {"reference": "Patient/x", "display": "patient"}},
            {"actor": {"reference": "Practitioner/7", "display": practitioner}},
        ],
    })
}

/// Maria Santos (`P1`): diabetic on metformin, lisinopril, and warfarin;
/// penicillin allergy; one upcoming and one past appointment.
pub fn maria_santos() -> PatientFixture {
    PatientFixture {
        patient: json!({
            "resourceType": "Patient",
            "id": "P1",
            "name": [{"given": ["Maria"], "family": "Santos"}],
            "birthDate": "1958-03-14",
            "gender": "female",
        }),
        conditions: vec![
            condition("Type 2 diabetes mellitus", "2015-06-01"),
            condition("Essential hypertension", "2018-02-11"),
        ],
        medications: vec![
            medication("Metformin 500 MG Oral Tablet"),
            medication("Lisinopril 10 MG Oral Tablet"),
            medication("Warfarin 5 MG Oral Tablet"),
        ],
        labs: vec![
            observation("laboratory", "Hemoglobin A1c", 7.2, "%", "2026-09-02"),
            observation("laboratory", "Creatinine", 1.1, "mg/dL", "2026-09-02"),
        ],
        vitals: vec![
            observation("vital-signs", "Systolic blood pressure", 138.0, "mmHg", "2026-10-01"),
            observation("vital-signs", "Heart rate", 72.0, "bpm", "2026-10-01"),
        ],
        allergies: vec![json!({
            "resourceType": "AllergyIntolerance",
            "code": {"text": "Penicillin"},
            "type": "allergy",
            "criticality": "high",
            "reaction": [{"manifestation": [{"text": "Hives"}], "severity": "moderate"}],
            "clinicalStatus": {"coding": [{"code": "active"}]},
        })],
        appointments: vec![
            appointment("2026-11-02T09:30:00", "Dr. Priya Patel", "Diabetes follow-up", "booked"),
            appointment("2026-03-01T14:00:00", "Dr. Priya Patel", "Annual physical", "fulfilled"),
        ],
    }
}

/// John Doe (`P2`): on atorvastatin and aspirin, no recorded allergies.
pub fn john_doe() -> PatientFixture {
    PatientFixture {
        patient: json!({
            "resourceType": "Patient",
            "id": "P2",
            "name": [{"given": ["John"], "family": "Doe"}],
            "birthDate": "1971-11-30",
            "gender": "male",
        }),
        conditions: vec![condition("Hyperlipidemia", "2020-01-15")],
        medications: vec![
            medication("Atorvastatin 20 MG Oral Tablet"),
            medication("Aspirin 81 MG Oral Tablet"),
        ],
        labs: vec![observation("laboratory", "LDL cholesterol", 130.0, "mg/dL", "2026-08-20")],
        vitals: vec![observation("vital-signs", "Heart rate", 64.0, "bpm", "2026-08-20")],
        allergies: Vec::new(),
        appointments: Vec::new(),
    }
}

/// Mock EHR collaborator.
pub struct MockEhr {
    patients: BTreeMap<String, PatientFixture>,
    calls: Mutex<Vec<EhrCall>>,
    notes: Mutex<Vec<ClinicalNote>>,
    fail_note_writes: AtomicBool,
    unhealthy: AtomicBool,
}

impl MockEhr {
    /// An EHR with no patients.
    pub fn new() -> Self {
        Self {
            patients: BTreeMap::new(),
            calls: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
            fail_note_writes: AtomicBool::new(false),
            unhealthy: AtomicBool::new(false),
        }
    }

    /// An EHR holding [`maria_santos`] as `P1` and [`john_doe`] as `P2`.
    pub fn with_fixture_patients() -> Self {
        Self::new()
            .with_patient("P1", maria_santos())
            .with_patient("P2", john_doe())
    }

    pub fn with_patient(mut self, id: &str, fixture: PatientFixture) -> Self {
        self.patients.insert(id.into(), fixture);
        self
    }

    pub async fn calls(&self) -> Vec<EhrCall> {
        self.calls.lock().await.clone()
    }

    /// Distinct patients any read was made for.
    pub async fn patients_accessed(&self) -> Vec<String> {
        let mut seen: Vec<String> = self
            .calls
            .lock()
            .await
            .iter()
            .filter_map(|c| c.patient.clone())
            .collect();
        seen.sort();
        seen.dedup();
        seen
    }

    pub async fn notes_written(&self) -> Vec<ClinicalNote> {
        self.notes.lock().await.clone()
    }

    /// Makes subsequent note writes fail with an upstream error.
    pub fn fail_note_writes(&self, fail: bool) {
        self.fail_note_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    async fn record(&self, operation: &'static str, patient: Option<&PatientId>) {
        self.calls.lock().await.push(EhrCall {
            operation,
            patient: patient.map(|p| p.to_string()),
        });
    }

    async fn patient_bundle(
        &self,
        operation: &'static str,
        patient: &PatientId,
        select: impl Fn(&PatientFixture) -> Vec<Value>,
    ) -> Value {
        self.record(operation, Some(patient)).await;
        let resources = self
            .patients
            .get(patient.as_str())
            .map(select)
            .unwrap_or_default();
        bundle(&resources)
    }
}

impl Default for MockEhr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEhr {
    fn name(&self) -> &str {
        "mock-ehr"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ehr
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("token endpoint unreachable".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl EhrAdapter for MockEhr {
    async fn get_patient(&self, patient: &PatientId) -> Result<Value, CarebridgeError> {
        self.record("get_patient", Some(patient)).await;
        self.patients
            .get(patient.as_str())
            .map(|f| f.patient.clone())
            .ok_or_else(|| {
                CarebridgeError::upstream("openemr", format!("Patient/{patient} not found (404)"))
            })
    }

    async fn search_patients(&self, name: &str) -> Result<Value, CarebridgeError> {
        self.record("search_patients", None).await;
        let needle = name.to_lowercase();
        let matches: Vec<Value> = self
            .patients
            .values()
            .filter(|f| {
                f.patient["name"][0]
                    .to_string()
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|f| f.patient.clone())
            .collect();
        Ok(bundle(&matches))
    }

    async fn get_conditions(&self, patient: &PatientId) -> Result<Value, CarebridgeError> {
        Ok(self
            .patient_bundle("get_conditions", patient, |f| f.conditions.clone())
            .await)
    }

    async fn get_medications(&self, patient: &PatientId) -> Result<Value, CarebridgeError> {
        Ok(self
            .patient_bundle("get_medications", patient, |f| f.medications.clone())
            .await)
    }

    async fn get_observations(
        &self,
        patient: &PatientId,
        category: Option<&str>,
    ) -> Result<Value, CarebridgeError> {
        Ok(self
            .patient_bundle("get_observations", patient, |f| match category {
                Some("laboratory") => f.labs.clone(),
                Some("vital-signs") => f.vitals.clone(),
                Some(_) => Vec::new(),
                None => f.labs.iter().chain(&f.vitals).cloned().collect(),
            })
            .await)
    }

    async fn get_allergies(&self, patient: &PatientId) -> Result<Value, CarebridgeError> {
        Ok(self
            .patient_bundle("get_allergies", patient, |f| f.allergies.clone())
            .await)
    }

    async fn get_appointments(&self, patient: &PatientId) -> Result<Value, CarebridgeError> {
        Ok(self
            .patient_bundle("get_appointments", patient, |f| f.appointments.clone())
            .await)
    }

    async fn create_clinical_note(&self, note: &ClinicalNote) -> Result<Value, CarebridgeError> {
        self.record("create_clinical_note", Some(&note.patient_uuid)).await;
        if self.fail_note_writes.load(Ordering::SeqCst) {
            return Err(CarebridgeError::upstream("openemr", "note write rejected (503)"));
        }
        let mut notes = self.notes.lock().await;
        notes.push(note.clone());
        Ok(json!({"id": notes.len(), "status": "saved"}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_patient_gets_empty_bundles_but_no_demographics() {
        let ehr = MockEhr::with_fixture_patients();
        let meds = ehr.get_medications(&PatientId::from("P9")).await.unwrap();
        assert_eq!(meds["total"], 0);
        assert!(ehr.get_patient(&PatientId::from("P9")).await.is_err());
    }

    #[tokio::test]
    async fn search_matches_name_case_insensitively() {
        let ehr = MockEhr::with_fixture_patients();
        let found = ehr.search_patients("santos").await.unwrap();
        assert_eq!(found["total"], 1);
        assert_eq!(found["entry"][0]["resource"]["id"], "P1");
    }

    #[tokio::test]
    async fn note_writes_are_counted_and_can_fail() {
        let ehr = MockEhr::new();
        let note = ClinicalNote {
            patient_uuid: PatientId::from("P1"),
            note_type: "SOAP".into(),
            content: "S: ok".into(),
        };
        ehr.create_clinical_note(&note).await.unwrap();
        ehr.fail_note_writes(true);
        assert!(ehr.create_clinical_note(&note).await.is_err());
        assert_eq!(ehr.notes_written().await.len(), 1);
        assert_eq!(ehr.patients_accessed().await, vec!["P1".to_string()]);
    }
}
