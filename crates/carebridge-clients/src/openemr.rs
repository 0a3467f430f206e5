// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenEMR FHIR R4 client.
//!
//! On first use the client registers itself through OAuth2 dynamic client
//! registration, then obtains a bearer token with the password grant. A 401
//! on any FHIR call triggers one re-authentication and one retry.

use std::time::Duration;

use async_trait::async_trait;
use carebridge_config::model::EhrConfig;
use carebridge_core::traits::{EhrAdapter, PluginAdapter};
use carebridge_core::types::ClinicalNote;
use carebridge_core::{AdapterType, CarebridgeError, HealthStatus, PatientId};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http::{build_client, decode, join, transport_error};

const SERVICE: &str = "ehr";
const SCOPE: &str = "openid api:oemr api:fhir";

#[derive(Debug, Default)]
struct AuthState {
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Registration {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenEMR client implementing [`EhrAdapter`].
pub struct OpenEmrClient {
    http: reqwest::Client,
    config: EhrConfig,
    timeout: Duration,
    auth: Mutex<AuthState>,
}

impl OpenEmrClient {
    pub fn new(config: &EhrConfig, timeout: Duration) -> Result<Self, CarebridgeError> {
        let is_https = config.base_url.starts_with("https");
        if is_https && !config.verify_tls {
            warn!("EHR TLS verification disabled; development use only");
        }
        let http = build_client(SERVICE, timeout, config.verify_tls || !is_https)?;
        Ok(Self {
            http,
            config: config.clone(),
            timeout,
            auth: Mutex::new(AuthState::default()),
        })
    }

    async fn register(&self, state: &mut AuthState) -> Result<(), CarebridgeError> {
        let url = join(&self.config.base_url, "oauth2/default/registration");
        let payload = serde_json::json!({
            "client_name": self.config.client_name,
            "redirect_uris": ["http://localhost/callback"],
            "application_type": "private",
            "scope": SCOPE,
            "grant_types": ["password"],
            "token_endpoint_auth_method": "client_secret_post",
        });
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;
        let registration: Registration = decode(SERVICE, response).await?;
        info!(client_id = %registration.client_id, "OAuth2 client registered with EHR");
        state.client_id = Some(registration.client_id);
        state.client_secret = registration.client_secret;
        Ok(())
    }

    /// Registers if needed, then fetches a fresh access token.
    async fn authenticate(&self, state: &mut AuthState) -> Result<String, CarebridgeError> {
        if state.client_id.is_none() {
            self.register(state).await?;
        }
        let url = join(&self.config.base_url, "oauth2/default/token");
        let form = [
            ("grant_type", "password"),
            ("client_id", state.client_id.as_deref().unwrap_or_default()),
            (
                "client_secret",
                state.client_secret.as_deref().unwrap_or_default(),
            ),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("scope", SCOPE),
        ];
        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;
        let token: TokenResponse = decode(SERVICE, response).await?;
        debug!("EHR access token obtained");
        state.access_token = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn token(&self) -> Result<String, CarebridgeError> {
        let mut state = self.auth.lock().await;
        if let Some(token) = state.access_token.clone() {
            return Ok(token);
        }
        self.authenticate(&mut state).await
    }

    async fn refresh_token(&self) -> Result<String, CarebridgeError> {
        let mut state = self.auth.lock().await;
        state.access_token = None;
        self.authenticate(&mut state).await
    }

    /// Sends a FHIR request, re-authenticating once on 401.
    async fn fhir(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, CarebridgeError> {
        let url = join(&self.config.fhir_url, path);
        let mut token = self.token().await?;

        for attempt in 0..2 {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| transport_error(SERVICE, self.timeout, e))?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                info!(path, "EHR token rejected, re-authenticating");
                token = self.refresh_token().await?;
                continue;
            }
            return decode(SERVICE, response).await;
        }
        Err(CarebridgeError::upstream(
            SERVICE,
            "authentication rejected after re-authentication",
        ))
    }

    async fn fhir_get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir(Method::GET, path, query, None).await
    }
}

/// FHIR `DocumentReference` carrying a clinical note as plain text.
fn document_reference(note: &ClinicalNote) -> serde_json::Value {
    serde_json::json!({
        "resourceType": "DocumentReference",
        "status": "current",
        "type": {"text": note.note_type},
        "subject": {"reference": format!("Patient/{}", note.patient_uuid)},
        "content": [{
            "attachment": {
                "contentType": "text/plain",
                "title": format!("{} note", note.note_type),
                "data": note.content,
            }
        }],
    })
}

#[async_trait]
impl PluginAdapter for OpenEmrClient {
    fn name(&self) -> &str {
        "openemr"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ehr
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        match self.fhir_get("metadata", &[]).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl EhrAdapter for OpenEmrClient {
    async fn get_patient(&self, patient: &PatientId) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get(&format!("Patient/{patient}"), &[]).await
    }

    async fn search_patients(&self, name: &str) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get("Patient", &[("name", name)]).await
    }

    async fn get_conditions(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get("Condition", &[("patient", patient.as_str())])
            .await
    }

    async fn get_medications(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get("MedicationRequest", &[("patient", patient.as_str())])
            .await
    }

    async fn get_observations(
        &self,
        patient: &PatientId,
        category: Option<&str>,
    ) -> Result<serde_json::Value, CarebridgeError> {
        let mut query = vec![("patient", patient.as_str())];
        if let Some(category) = category {
            query.push(("category", category));
        }
        self.fhir_get("Observation", &query).await
    }

    async fn get_allergies(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get("AllergyIntolerance", &[("patient", patient.as_str())])
            .await
    }

    async fn get_appointments(
        &self,
        patient: &PatientId,
    ) -> Result<serde_json::Value, CarebridgeError> {
        self.fhir_get("Appointment", &[("patient", patient.as_str())])
            .await
    }

    async fn create_clinical_note(
        &self,
        note: &ClinicalNote,
    ) -> Result<serde_json::Value, CarebridgeError> {
        let body = document_reference(note);
        info!(
            patient_uuid = %note.patient_uuid,
            note_type = note.note_type,
            "writing clinical note to EHR"
        );
        self.fhir(Method::POST, "DocumentReference", &[], Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> EhrConfig {
        EhrConfig {
            base_url: server.uri(),
            api_url: format!("{}/apis/default", server.uri()),
            fhir_url: format!("{}/apis/default/fhir", server.uri()),
            ..EhrConfig::default()
        }
    }

    async fn mount_auth(server: &MockServer, tokens: &[&str]) {
        Mock::given(method("POST"))
            .and(path("/oauth2/default/registration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "client_id": "cid",
                "client_secret": "secret"
            })))
            .expect(1)
            .mount(server)
            .await;
        for (i, token) in tokens.iter().enumerate() {
            let mock = Mock::given(method("POST"))
                .and(path("/oauth2/default/token"))
                .and(body_string_contains("grant_type=password"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"access_token": token})),
                );
            if i + 1 < tokens.len() {
                mock.up_to_n_times(1).mount(server).await;
            } else {
                mock.mount(server).await;
            }
        }
    }

    #[tokio::test]
    async fn registers_then_fetches_with_bearer_token() {
        let server = MockServer::start().await;
        mount_auth(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/apis/default/fhir/MedicationRequest"))
            .and(query_param("patient", "P1"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"resourceType": "Bundle", "entry": []})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = OpenEmrClient::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let patient = PatientId::from("P1");
        client.get_medications(&patient).await.unwrap();
        // second call reuses the cached token (registration expected exactly once)
        let bundle = client.get_medications(&patient).await.unwrap();
        assert_eq!(bundle["resourceType"], "Bundle");
    }

    #[tokio::test]
    async fn reauthenticates_once_on_401() {
        let server = MockServer::start().await;
        mount_auth(&server, &["stale", "fresh"]).await;
        Mock::given(method("GET"))
            .and(path("/apis/default/fhir/Patient/P1"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apis/default/fhir/Patient/P1"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"resourceType": "Patient", "id": "P1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenEmrClient::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let patient = client.get_patient(&PatientId::from("P1")).await.unwrap();
        assert_eq!(patient["id"], "P1");
    }

    #[tokio::test]
    async fn server_error_maps_to_upstream() {
        let server = MockServer::start().await;
        mount_auth(&server, &["tok"]).await;
        Mock::given(method("GET"))
            .and(path("/apis/default/fhir/Condition"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = OpenEmrClient::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let err = client
            .get_conditions(&PatientId::from("P1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CarebridgeError::Upstream { ref service, .. } if service == "ehr"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn clinical_note_posts_document_reference() {
        let server = MockServer::start().await;
        mount_auth(&server, &["tok"]).await;
        Mock::given(method("POST"))
            .and(path("/apis/default/fhir/DocumentReference"))
            .and(body_string_contains("Patient/P9"))
            .and(body_string_contains("SOAP"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"resourceType": "DocumentReference", "id": "doc-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenEmrClient::new(&config_for(&server), Duration::from_secs(5)).unwrap();
        let created = client
            .create_clinical_note(&ClinicalNote {
                patient_uuid: PatientId::from("P9"),
                note_type: "SOAP".into(),
                content: "S: stable".into(),
            })
            .await
            .unwrap();
        assert_eq!(created["id"], "doc-1");
    }
}
