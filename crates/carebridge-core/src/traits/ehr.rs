// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Electronic-health-record collaborator trait.

use async_trait::async_trait;

use crate::error::CarebridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ClinicalNote, PatientId};

/// Adapter for the EHR's FHIR surface.
///
/// Read methods return raw FHIR resources or bundles; flattening into
/// compact records is the tool layer's job. Authentication, token refresh,
/// and the single transport retry are handled inside the implementation.
#[async_trait]
pub trait EhrAdapter: PluginAdapter {
    /// Fetches a single `Patient` resource.
    async fn get_patient(&self, patient: &PatientId) -> Result<serde_json::Value, CarebridgeError>;

    /// Searches `Patient` resources by name; returns a bundle.
    async fn search_patients(&self, name: &str) -> Result<serde_json::Value, CarebridgeError>;

    /// `Condition` bundle for a patient.
    async fn get_conditions(&self, patient: &PatientId)
    -> Result<serde_json::Value, CarebridgeError>;

    /// `MedicationRequest` bundle for a patient.
    async fn get_medications(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError>;

    /// `Observation` bundle, optionally filtered by category
    /// (`laboratory`, `vital-signs`).
    async fn get_observations(
        &self,
        patient: &PatientId,
        category: Option<&str>,
    ) -> Result<serde_json::Value, CarebridgeError>;

    /// `AllergyIntolerance` bundle for a patient.
    async fn get_allergies(&self, patient: &PatientId)
    -> Result<serde_json::Value, CarebridgeError>;

    /// `Appointment` bundle for a patient.
    async fn get_appointments(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError>;

    /// Persists an approved clinical note. The only mutating call on this trait.
    async fn create_clinical_note(
        &self,
        note: &ClinicalNote,
    ) -> Result<serde_json::Value, CarebridgeError>;
}
