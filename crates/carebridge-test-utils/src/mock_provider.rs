// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted model provider for deterministic agent tests.
//!
//! Responses are popped from a FIFO queue; each entry is a full response
//! (text and/or tool-use blocks), a failure, or a call that never returns.
//! Every request is recorded so tests can inspect what the model was shown.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use carebridge_core::{
    AdapterType, CarebridgeError, ContentBlock, HealthStatus, PluginAdapter, ProviderAdapter,
    ProviderRequest, ProviderResponse, TokenUsage,
};

enum Step {
    Reply(ProviderResponse),
    Fail(String),
    Stall,
}

/// A provider that replays a script.
///
/// When the script runs out, a plain "mock response" text is returned.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a final text answer.
    pub async fn push_text(&self, text: &str) {
        self.push_response(text_response(text)).await;
    }

    /// Queue a response requesting the given tool calls.
    pub async fn push_tool_calls(&self, calls: &[(&str, serde_json::Value)]) {
        self.push_response(tool_use_response(calls)).await;
    }

    pub async fn push_response(&self, response: ProviderResponse) {
        self.script.lock().await.push_back(Step::Reply(response));
    }

    /// Queue a provider error.
    pub async fn push_failure(&self, message: &str) {
        self.script.lock().await.push_back(Step::Fail(message.into()));
    }

    /// Queue a call that never completes.
    pub async fn push_stall(&self) {
        self.script.lock().await.push_back(Step::Stall);
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// Script entries not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// A response carrying only text.
pub fn text_response(text: &str) -> ProviderResponse {
    response(vec![ContentBlock::Text { text: text.into() }], "end_turn")
}

/// A response requesting tool calls, with ids unique within the response.
pub fn tool_use_response(calls: &[(&str, serde_json::Value)]) -> ProviderResponse {
    let content = calls
        .iter()
        .enumerate()
        .map(|(i, (name, input))| ContentBlock::ToolUse {
            id: format!("toolu_{name}_{i}"),
            name: (*name).into(),
            input: input.clone(),
        })
        .collect();
    response(content, "tool_use")
}

fn response(content: Vec<ContentBlock>, stop_reason: &str) -> ProviderResponse {
    ProviderResponse {
        id: "msg_mock".into(),
        model: "mock-model".into(),
        content,
        stop_reason: Some(stop_reason.into()),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, CarebridgeError> {
        self.requests.lock().await.push(request);
        let step = self.script.lock().await.pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(CarebridgeError::Provider {
                message,
                source: None,
            }),
            Some(Step::Stall) => std::future::pending().await,
            None => Ok(text_response("mock response")),
        }
    }
}
