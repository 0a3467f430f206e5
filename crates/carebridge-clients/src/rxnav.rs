// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RxNorm / RxNav drug-name resolution and interaction lookup.
//!
//! Names resolve through four tiers, each normalized to the ingredient
//! concept (`related.json?tty=IN`):
//!
//! 1. exact match (`rxcui.json?search=0`), confidence 1.0
//! 2. approximate term (`approximateTerm.json`), 0.85, or 0.4 when the
//!    candidates normalize to more than one ingredient
//! 3. brand or synonym search (`drugs.json`), 0.6
//! 4. unresolved, 0.0
//!
//! A tier that errors falls through to the next one.

use std::time::Duration;

use async_trait::async_trait;
use carebridge_core::traits::{DrugReferenceAdapter, PluginAdapter};
use carebridge_core::{
    AdapterType, CarebridgeError, DrugCandidate, DrugInteraction, DrugResolution, HealthStatus,
};
use serde_json::Value;
use tracing::debug;

use crate::http::{build_client, decode, join, transport_error};

const SERVICE: &str = "rxnav";
const MAX_APPROXIMATE: usize = 5;

/// RxNav client implementing [`DrugReferenceAdapter`].
pub struct RxNavClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
struct Concept {
    rxcui: String,
    name: String,
}

impl RxNavClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CarebridgeError> {
        Ok(Self {
            http: build_client(SERVICE, timeout, true)?,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, CarebridgeError> {
        let response = self
            .http
            .get(join(&self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;
        decode(SERVICE, response).await
    }

    async fn exact_rxcui(&self, name: &str) -> Result<Option<String>, CarebridgeError> {
        let data = self
            .get("rxcui.json", &[("name", name), ("search", "0")])
            .await?;
        Ok(data["idGroup"]["rxnormId"][0].as_str().map(str::to_string))
    }

    async fn approximate(&self, term: &str) -> Result<Vec<DrugCandidate>, CarebridgeError> {
        let max = MAX_APPROXIMATE.to_string();
        let data = self
            .get(
                "approximateTerm.json",
                &[("term", term), ("maxEntries", max.as_str())],
            )
            .await?;
        Ok(data["approximateGroup"]["candidate"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|c| DrugCandidate {
                        rxcui: string_field(c, "rxcui"),
                        name: string_field(c, "name"),
                        score: c["score"]
                            .as_str()
                            .and_then(|s| s.parse::<f64>().ok())
                            .or_else(|| c["score"].as_f64())
                            .map(|s| s as u32),
                    })
                    .filter(|c| !c.rxcui.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ingredient(&self, rxcui: &str) -> Result<Option<Concept>, CarebridgeError> {
        let data = self
            .get(&format!("rxcui/{rxcui}/related.json"), &[("tty", "IN")])
            .await?;
        let groups = data["relatedGroup"]["conceptGroup"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(groups.iter().find_map(|group| {
            let props = &group["conceptProperties"][0];
            props["rxcui"].as_str().map(|rxcui| Concept {
                rxcui: rxcui.to_string(),
                name: string_field(props, "name"),
            })
        }))
    }

    /// Ingredient lookup where failure just means "no normalization".
    async fn ingredient_or_none(&self, rxcui: &str) -> Option<Concept> {
        self.ingredient(rxcui).await.ok().flatten()
    }

    async fn drugs_by_name(&self, name: &str) -> Result<Vec<DrugCandidate>, CarebridgeError> {
        let data = self.get("drugs.json", &[("name", name)]).await?;
        let mut out = Vec::new();
        for group in data["drugGroup"]["conceptGroup"]
            .as_array()
            .into_iter()
            .flatten()
        {
            for prop in group["conceptProperties"].as_array().into_iter().flatten() {
                out.push(DrugCandidate {
                    rxcui: string_field(prop, "rxcui"),
                    name: string_field(prop, "name"),
                    score: None,
                });
            }
        }
        Ok(out)
    }

    async fn tier_exact(&self, name: &str) -> Result<Option<DrugResolution>, CarebridgeError> {
        let Some(rxcui) = self.exact_rxcui(name).await? else {
            return Ok(None);
        };
        let ingredient = self.ingredient_or_none(&rxcui).await;
        Ok(Some(DrugResolution {
            rxcui: Some(ingredient.as_ref().map_or(rxcui, |i| i.rxcui.clone())),
            name: ingredient.map_or_else(|| name.to_string(), |i| i.name),
            resolution_tier: 1,
            confidence: 1.0,
            ..DrugResolution::unresolved(name)
        }))
    }

    async fn tier_approximate(
        &self,
        name: &str,
    ) -> Result<Option<DrugResolution>, CarebridgeError> {
        let candidates = self.approximate(name).await?;
        let mut unique: Vec<Concept> = Vec::new();
        for candidate in candidates.iter().take(MAX_APPROXIMATE) {
            if let Some(ing) = self.ingredient_or_none(&candidate.rxcui).await
                && !ing.rxcui.is_empty()
                && !unique.iter().any(|u| u.rxcui == ing.rxcui)
            {
                unique.push(ing);
            }
        }
        let Some(first) = unique.first().cloned() else {
            return Ok(None);
        };
        let ambiguous = unique.len() > 1;
        Ok(Some(DrugResolution {
            rxcui: Some(first.rxcui),
            name: first.name,
            resolution_tier: 2,
            confidence: if ambiguous { 0.4 } else { 0.85 },
            ambiguous,
            candidates,
            ..DrugResolution::unresolved(name)
        }))
    }

    async fn tier_brand(&self, name: &str) -> Result<Option<DrugResolution>, CarebridgeError> {
        let drugs = self.drugs_by_name(name).await?;
        let Some(first) = drugs.first().cloned() else {
            return Ok(None);
        };
        let ingredient = self.ingredient_or_none(&first.rxcui).await;
        Ok(Some(DrugResolution {
            rxcui: Some(
                ingredient
                    .as_ref()
                    .map_or_else(|| first.rxcui.clone(), |i| i.rxcui.clone()),
            ),
            name: ingredient.map_or(first.name, |i| i.name),
            resolution_tier: 3,
            confidence: 0.6,
            candidates: drugs.into_iter().take(3).collect(),
            ..DrugResolution::unresolved(name)
        }))
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_string()
}

/// Flattens `fullInteractionTypeGroup[].fullInteractionType[].interactionPair[]`.
fn parse_interactions(data: &Value) -> Vec<DrugInteraction> {
    let mut out = Vec::new();
    let groups = data["fullInteractionTypeGroup"].as_array().into_iter().flatten();
    for group in groups {
        let types = group["fullInteractionType"].as_array().into_iter().flatten();
        for itype in types {
            for pair in itype["interactionPair"].as_array().into_iter().flatten() {
                out.push(DrugInteraction {
                    severity: pair["severity"].as_str().unwrap_or("N/A").to_string(),
                    description: string_field(pair, "description"),
                    drugs: pair["interactionConcept"]
                        .as_array()
                        .into_iter()
                        .flatten()
                        .map(|c| string_field(&c["minConceptItem"], "name"))
                        .collect(),
                });
            }
        }
    }
    out
}

#[async_trait]
impl PluginAdapter for RxNavClient {
    fn name(&self) -> &str {
        "rxnav"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DrugReference
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        match self.get("version.json", &[]).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }
}

#[async_trait]
impl DrugReferenceAdapter for RxNavClient {
    async fn resolve(&self, drug_name: &str) -> Result<DrugResolution, CarebridgeError> {
        match self.tier_exact(drug_name).await {
            Ok(Some(resolution)) => return Ok(resolution),
            Ok(None) => {}
            Err(e) => debug!(drug = drug_name, error = %e, "exact tier failed"),
        }
        match self.tier_approximate(drug_name).await {
            Ok(Some(resolution)) => return Ok(resolution),
            Ok(None) => {}
            Err(e) => debug!(drug = drug_name, error = %e, "approximate tier failed"),
        }
        match self.tier_brand(drug_name).await {
            Ok(Some(resolution)) => return Ok(resolution),
            Ok(None) => {}
            Err(e) => debug!(drug = drug_name, error = %e, "brand tier failed"),
        }
        Ok(DrugResolution::unresolved(drug_name))
    }

    async fn interactions(
        &self,
        rxcuis: &[String],
    ) -> Result<Vec<DrugInteraction>, CarebridgeError> {
        if rxcuis.len() < 2 {
            return Ok(Vec::new());
        }
        // Space-separated; serialized as `+` in the query string.
        let joined = rxcuis.join(" ");
        let data = self
            .get("interaction/list.json", &[("rxcuis", joined.as_str())])
            .await?;
        Ok(parse_interactions(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RxNavClient {
        RxNavClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    async fn mount_json(server: &MockServer, p: &str, params: &[(&str, &str)], body: Value) {
        let mut mock = Mock::given(method("GET")).and(path(p));
        for (k, v) in params {
            mock = mock.and(query_param(*k, *v));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn ingredient_body(rxcui: &str, name: &str) -> Value {
        serde_json::json!({
            "relatedGroup": {"conceptGroup": [
                {"tty": "IN", "conceptProperties": [{"rxcui": rxcui, "name": name}]}
            ]}
        })
    }

    #[tokio::test]
    async fn exact_match_normalizes_to_ingredient() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/rxcui.json",
            &[("name", "Coumadin 5 MG"), ("search", "0")],
            serde_json::json!({"idGroup": {"rxnormId": ["855332"]}}),
        )
        .await;
        mount_json(
            &server,
            "/rxcui/855332/related.json",
            &[("tty", "IN")],
            ingredient_body("11289", "warfarin"),
        )
        .await;

        let resolution = client(&server).resolve("Coumadin 5 MG").await.unwrap();
        assert_eq!(resolution.resolution_tier, 1);
        assert_eq!(resolution.rxcui.as_deref(), Some("11289"));
        assert_eq!(resolution.name, "warfarin");
        assert!((resolution.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn approximate_match_flags_ambiguity() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/rxcui.json",
            &[],
            serde_json::json!({"idGroup": {}}),
        )
        .await;
        mount_json(
            &server,
            "/approximateTerm.json",
            &[("term", "metfor")],
            serde_json::json!({"approximateGroup": {"candidate": [
                {"rxcui": "1", "name": "metformin 500", "score": "80"},
                {"rxcui": "2", "name": "metoprolol", "score": "60"}
            ]}}),
        )
        .await;
        mount_json(&server, "/rxcui/1/related.json", &[], ingredient_body("6809", "metformin")).await;
        mount_json(&server, "/rxcui/2/related.json", &[], ingredient_body("6918", "metoprolol")).await;

        let resolution = client(&server).resolve("metfor").await.unwrap();
        assert_eq!(resolution.resolution_tier, 2);
        assert!(resolution.ambiguous);
        assert_eq!(resolution.name, "metformin");
        assert!((resolution.confidence - 0.4).abs() < f64::EPSILON);
        assert_eq!(resolution.candidates.len(), 2);
        assert_eq!(resolution.candidates[0].score, Some(80));
    }

    #[tokio::test]
    async fn brand_tier_used_when_earlier_tiers_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rxcui.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/approximateTerm.json",
            &[],
            serde_json::json!({"approximateGroup": {"candidate": []}}),
        )
        .await;
        mount_json(
            &server,
            "/drugs.json",
            &[("name", "Tylenol")],
            serde_json::json!({"drugGroup": {"conceptGroup": [
                {"tty": "SBD", "conceptProperties": [{"rxcui": "209387", "name": "Tylenol 325 MG Oral Tablet"}]}
            ]}}),
        )
        .await;
        mount_json(
            &server,
            "/rxcui/209387/related.json",
            &[],
            ingredient_body("161", "acetaminophen"),
        )
        .await;

        let resolution = client(&server).resolve("Tylenol").await.unwrap();
        assert_eq!(resolution.resolution_tier, 3);
        assert_eq!(resolution.name, "acetaminophen");
        assert_eq!(resolution.rxcui.as_deref(), Some("161"));
    }

    #[tokio::test]
    async fn unresolvable_name_is_tier_four() {
        let server = MockServer::start().await;
        mount_json(&server, "/rxcui.json", &[], serde_json::json!({"idGroup": {}})).await;
        mount_json(
            &server,
            "/approximateTerm.json",
            &[],
            serde_json::json!({"approximateGroup": {}}),
        )
        .await;
        mount_json(&server, "/drugs.json", &[], serde_json::json!({"drugGroup": {}})).await;

        let resolution = client(&server).resolve("notadrug").await.unwrap();
        assert_eq!(resolution.resolution_tier, 4);
        assert!(resolution.rxcui.is_none());
        assert_eq!(resolution.name, "notadrug");
    }

    #[tokio::test]
    async fn interactions_parse_full_interaction_groups() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/interaction/list.json",
            &[("rxcuis", "11289 1191")],
            serde_json::json!({"fullInteractionTypeGroup": [{
                "fullInteractionType": [{
                    "interactionPair": [{
                        "severity": "high",
                        "description": "Increased bleeding risk.",
                        "interactionConcept": [
                            {"minConceptItem": {"name": "warfarin"}},
                            {"minConceptItem": {"name": "aspirin"}}
                        ]
                    }]
                }]
            }]}),
        )
        .await;

        let interactions = client(&server)
            .interactions(&["11289".into(), "1191".into()])
            .await
            .unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].severity, "high");
        assert_eq!(interactions[0].drugs, vec!["warfarin", "aspirin"]);
    }

    #[tokio::test]
    async fn fewer_than_two_rxcuis_skips_the_call() {
        let server = MockServer::start().await;
        let result = client(&server).interactions(&["1".into()]).await.unwrap();
        assert!(result.is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
