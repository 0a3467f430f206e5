// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public medical reference-data collaborator traits.

use async_trait::async_trait;

use crate::error::CarebridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Article, DrugInteraction, DrugResolution, Icd10Code};

/// Drug-name resolution and interaction lookup (RxNorm/RxNav).
#[async_trait]
pub trait DrugReferenceAdapter: PluginAdapter {
    /// Resolves a free-text drug name to an ingredient-level concept.
    /// Unresolvable names yield a tier-4 result, not an error.
    async fn resolve(&self, drug_name: &str) -> Result<DrugResolution, CarebridgeError>;

    /// Known interactions among the given RxCUIs. Fewer than two yields an empty list.
    async fn interactions(&self, rxcuis: &[String])
    -> Result<Vec<DrugInteraction>, CarebridgeError>;
}

/// ICD-10-CM code search.
#[async_trait]
pub trait Icd10Adapter: PluginAdapter {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Icd10Code>, CarebridgeError>;
}

/// Biomedical literature search.
#[async_trait]
pub trait LiteratureAdapter: PluginAdapter {
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<Article>, CarebridgeError>;
}
