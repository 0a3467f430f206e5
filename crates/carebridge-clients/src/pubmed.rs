// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PubMed search through NCBI E-utilities (`esearch` then `esummary`).

use std::time::Duration;

use async_trait::async_trait;
use carebridge_core::traits::{LiteratureAdapter, PluginAdapter};
use carebridge_core::{AdapterType, Article, CarebridgeError, HealthStatus};
use serde_json::Value;

use crate::http::{build_client, decode, join, transport_error};

const SERVICE: &str = "pubmed";
const MAX_AUTHORS: usize = 3;

pub struct PubMedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PubMedClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CarebridgeError> {
        Ok(Self {
            http: build_client(SERVICE, timeout, true)?,
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    async fn eutil(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, CarebridgeError> {
        let mut query: Vec<(&str, &str)> = vec![("db", "pubmed"), ("retmode", "json")];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.as_str()));
        }
        query.extend_from_slice(params);
        let response = self
            .http
            .get(join(&self.base_url, endpoint))
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, self.timeout, e))?;
        decode(SERVICE, response).await
    }
}

fn parse_summaries(ids: &[String], data: &Value) -> Vec<Article> {
    ids.iter()
        .filter_map(|pmid| {
            let article = data["result"].get(pmid)?;
            Some(Article {
                pmid: pmid.clone(),
                title: article["title"].as_str().unwrap_or_default().to_string(),
                authors: article["authors"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .take(MAX_AUTHORS)
                    .filter_map(|a| a["name"].as_str().map(str::to_string))
                    .collect(),
                source: article["source"].as_str().unwrap_or_default().to_string(),
                pubdate: article["pubdate"].as_str().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for PubMedClient {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Literature
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        match self.eutil("einfo.fcgi", &[]).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }
}

#[async_trait]
impl LiteratureAdapter for PubMedClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Article>, CarebridgeError> {
        let retmax = max_results.to_string();
        let found = self
            .eutil("esearch.fcgi", &[("term", query), ("retmax", retmax.as_str())])
            .await?;
        let ids: Vec<String> = found["esearchresult"]["idlist"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids.join(",");
        let summaries = self.eutil("esummary.fcgi", &[("id", joined.as_str())]).await?;
        Ok(parse_summaries(&ids, &summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_then_summarize_keeps_first_three_authors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("term", "metformin lactic acidosis"))
            .and(query_param("api_key", "ncbi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"idlist": ["111", "222"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "111,222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "uids": ["111", "222"],
                    "111": {
                        "title": "Metformin and lactate",
                        "authors": [{"name": "A"}, {"name": "B"}, {"name": "C"}, {"name": "D"}],
                        "source": "Diabetes Care",
                        "pubdate": "2021 Mar"
                    }
                }
            })))
            .mount(&server)
            .await;

        let client =
            PubMedClient::new(&server.uri(), Some("ncbi".into()), Duration::from_secs(5)).unwrap();
        let articles = client.search("metformin lactic acidosis", 5).await.unwrap();
        // 222 has no summary and is skipped
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].pmid, "111");
        assert_eq!(articles[0].authors, vec!["A", "B", "C"]);
        assert_eq!(articles[0].source, "Diabetes Care");
    }

    #[tokio::test]
    async fn no_hits_skips_summary_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"idlist": []}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = PubMedClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        assert!(client.search("nothing", 5).await.unwrap().is_empty());
    }
}
