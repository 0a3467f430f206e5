// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ICD-10-CM search through the NLM Clinical Tables API.

use std::time::Duration;

use async_trait::async_trait;
use carebridge_core::traits::{Icd10Adapter, PluginAdapter};
use carebridge_core::{AdapterType, CarebridgeError, HealthStatus, Icd10Code};
use serde_json::Value;

use crate::http::{build_client, decode, join, transport_error};

const SERVICE: &str = "icd10";

pub struct Icd10Client {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Icd10Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CarebridgeError> {
        Ok(Self {
            http: build_client(SERVICE, timeout, true)?,
            base_url: base_url.to_string(),
            timeout,
        })
    }
}

/// Parses `[total, codes, extra, displays]` where each display is `[code, name]`.
fn parse_search(data: &Value) -> Vec<Icd10Code> {
    let codes = data[1].as_array().cloned().unwrap_or_default();
    codes
        .iter()
        .enumerate()
        .filter_map(|(i, code)| {
            let code = code.as_str()?;
            Some(Icd10Code {
                code: code.to_string(),
                description: data[3][i][1].as_str().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for Icd10Client {
    fn name(&self) -> &str {
        "icd10"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Icd10
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        match self.search("I10", 1).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }
}

#[async_trait]
impl Icd10Adapter for Icd10Client {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Icd10Code>, CarebridgeError> {
        let max = max_results.to_string();
        let response = self
            .http
            .get(join(&self.base_url, "search"))
            .query(&[("sf", "code,name"), ("terms", query), ("maxList", max.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;
        let data: Value = decode(SERVICE, response).await?;
        Ok(parse_search(&data))
    }
}
