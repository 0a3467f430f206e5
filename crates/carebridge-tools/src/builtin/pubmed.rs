// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Literature search against PubMed.

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, LiteratureAdapter};
use serde_json::json;

use super::str_arg;
use crate::tool::{Tool, success};

const DEFAULT_MAX_RESULTS: u64 = 5;
const MAX_RESULTS_CAP: u64 = 20;

pub struct PubMedSearchTool {
    literature: Arc<dyn LiteratureAdapter>,
}

impl PubMedSearchTool {
    pub fn new(literature: Arc<dyn LiteratureAdapter>) -> Self {
        Self { literature }
    }
}

#[async_trait]
impl Tool for PubMedSearchTool {
    fn name(&self) -> &str {
        "pubmed_search"
    }

    fn description(&self) -> &str {
        "Search PubMed for medical literature relevant to a clinical question."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A clinical search query, e.g. \"aspirin cardiovascular prevention\"."
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_RESULTS_CAP,
                    "description": "Maximum number of articles to return (default 5)."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let query = str_arg(self.name(), &input, "query")?;
        let max_results = input["max_results"]
            .as_u64()
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP) as usize;
        let articles = self.literature.search(query, max_results).await?;
        Ok(success(json!({ "articles": articles })))
    }
}
