// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock reference-data collaborators: drug resolution and interactions,
//! ICD-10 search, and literature search.

use async_trait::async_trait;
use tokio::sync::Mutex;

use carebridge_core::{
    AdapterType, Article, CarebridgeError, DrugCandidate, DrugInteraction, DrugReferenceAdapter,
    DrugResolution, HealthStatus, Icd10Adapter, Icd10Code, LiteratureAdapter, PluginAdapter,
};

/// (lowercase name, rxcui, ingredient name, tier)
const DRUGS: &[(&str, &str, &str, u8)] = &[
    ("warfarin", "11289", "warfarin", 1),
    ("aspirin", "1191", "aspirin", 1),
    ("metformin", "6809", "metformin", 1),
    ("lisinopril", "29046", "lisinopril", 1),
    ("atorvastatin", "83367", "atorvastatin", 1),
    ("ibuprofen", "5640", "ibuprofen", 1),
    ("coumadin", "11289", "warfarin", 3),
    ("advil", "5640", "ibuprofen", 3),
];

/// (rxcui, rxcui, severity, description)
const INTERACTIONS: &[(&str, &str, &str, &str)] = &[
    (
        "11289",
        "1191",
        "high",
        "Aspirin may increase the anticoagulant effect of warfarin and the risk of bleeding.",
    ),
    (
        "11289",
        "5640",
        "high",
        "Ibuprofen may increase the risk of bleeding when combined with warfarin.",
    ),
];

macro_rules! plugin_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
                Ok(HealthStatus::Healthy)
            }
        }
    };
}

/// Resolves a handful of generics and brands; knows two warfarin interactions.
#[derive(Default)]
pub struct MockDrugReference {
    lookups: Mutex<Vec<String>>,
}

impl MockDrugReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names passed to `resolve`, in call order.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.lock().await.clone()
    }
}

plugin_adapter!(MockDrugReference, "mock-rxnav", AdapterType::DrugReference);

#[async_trait]
impl DrugReferenceAdapter for MockDrugReference {
    async fn resolve(&self, drug_name: &str) -> Result<DrugResolution, CarebridgeError> {
        self.lookups.lock().await.push(drug_name.into());
        let key = drug_name.trim().to_lowercase();
        let Some((_, rxcui, name, tier)) = DRUGS.iter().find(|(n, ..)| *n == key) else {
            return Ok(DrugResolution::unresolved(drug_name));
        };
        Ok(DrugResolution {
            original_name: drug_name.into(),
            rxcui: Some((*rxcui).into()),
            name: (*name).into(),
            resolution_tier: *tier,
            confidence: if *tier == 1 { 1.0 } else { 0.9 },
            ambiguous: false,
            candidates: vec![DrugCandidate {
                rxcui: (*rxcui).into(),
                name: (*name).into(),
                score: None,
            }],
        })
    }

    async fn interactions(
        &self,
        rxcuis: &[String],
    ) -> Result<Vec<DrugInteraction>, CarebridgeError> {
        let name_of = |rxcui: &str| {
            DRUGS
                .iter()
                .find(|(_, id, _, tier)| *id == rxcui && *tier == 1)
                .map_or_else(|| rxcui.to_string(), |(_, _, name, _)| (*name).to_string())
        };
        let has = |rxcui: &str| rxcuis.iter().any(|r| r == rxcui);
        Ok(INTERACTIONS
            .iter()
            .filter(|(a, b, ..)| has(*a) && has(*b))
            .map(|(a, b, severity, description)| DrugInteraction {
                severity: (*severity).into(),
                description: (*description).into(),
                drugs: vec![name_of(*a), name_of(*b)],
            })
            .collect())
    }
}

const CODES: &[(&str, &str)] = &[
    ("E11.9", "Type 2 diabetes mellitus without complications"),
    ("E11.65", "Type 2 diabetes mellitus with hyperglycemia"),
    ("I10", "Essential (primary) hypertension"),
    ("E78.5", "Hyperlipidemia, unspecified"),
];

/// Matches queries against a small ICD-10-CM table.
#[derive(Default)]
pub struct MockIcd10;

plugin_adapter!(MockIcd10, "mock-icd10", AdapterType::Icd10);

#[async_trait]
impl Icd10Adapter for MockIcd10 {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Icd10Code>, CarebridgeError> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(CODES
            .iter()
            .filter(|(_, description)| {
                let description = description.to_lowercase();
                terms.iter().all(|t| description.contains(t.as_str()))
            })
            .take(max_results)
            .map(|(code, description)| Icd10Code {
                code: (*code).into(),
                description: (*description).into(),
            })
            .collect())
    }
}

/// Generates `max_results` synthetic articles per query.
#[derive(Default)]
pub struct MockLiterature {
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockLiterature {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(query, max_results)` pairs received, in call order.
    pub async fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().await.clone()
    }
}

plugin_adapter!(MockLiterature, "mock-pubmed", AdapterType::Literature);

#[async_trait]
impl LiteratureAdapter for MockLiterature {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Article>, CarebridgeError> {
        self.queries.lock().await.push((query.into(), max_results));
        Ok((0..max_results)
            .map(|i| Article {
                pmid: format!("{}", 39_000_000 + i),
                title: format!("Study {} on {query}", i + 1),
                authors: vec!["Nguyen A".into(), "Okafor B".into()],
                source: "J Clin Med".into(),
                pubdate: "2025".into(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn brand_names_resolve_to_ingredients() {
        let drugs = MockDrugReference::new();
        let coumadin = drugs.resolve("Coumadin").await.unwrap();
        assert_eq!(coumadin.name, "warfarin");
        assert_eq!(coumadin.resolution_tier, 3);
        assert_eq!(drugs.resolve("zzz").await.unwrap().resolution_tier, 4);
    }

    #[tokio::test]
    async fn interactions_need_both_drugs() {
        let drugs = MockDrugReference::new();
        let found = drugs
            .interactions(&["11289".into(), "1191".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].drugs, vec!["warfarin", "aspirin"]);
        assert!(drugs.interactions(&["11289".into()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn icd10_requires_every_term() {
        let codes = MockIcd10.search("type 2 diabetes", 10).await.unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(MockIcd10.search("hypertension", 10).await.unwrap()[0].code, "I10");
    }
}
