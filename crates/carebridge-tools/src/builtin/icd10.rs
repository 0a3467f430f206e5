// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, Icd10Adapter};
use serde_json::json;

use super::str_arg;
use crate::tool::{Tool, success};

const DEFAULT_MAX_CODES: usize = 10;

/// ICD-10-CM lookup by keyword or code prefix.
pub struct Icd10LookupTool {
    icd10: Arc<dyn Icd10Adapter>,
}

impl Icd10LookupTool {
    pub fn new(icd10: Arc<dyn Icd10Adapter>) -> Self {
        Self { icd10 }
    }
}

#[async_trait]
impl Tool for Icd10LookupTool {
    fn name(&self) -> &str {
        "icd10_lookup"
    }

    fn description(&self) -> &str {
        "Look up ICD-10-CM diagnosis codes by keyword or code prefix."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A search term like \"diabetes type 2\" or a code prefix like \"E11\"."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
        let query = str_arg(self.name(), &input, "query")?;
        let codes = self.icd10.search(query, DEFAULT_MAX_CODES).await?;
        Ok(success(json!({ "codes": codes })))
    }
}
