// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Carebridge.
//!
//! Implements [`ProviderAdapter`] over the Messages API with tool use.
//! Transcript roles are mapped onto the API's strict user/assistant
//! alternation: tool results travel as `tool_result` blocks inside user
//! messages, and adjacent same-role messages are merged.

pub mod client;
pub mod types;

use async_trait::async_trait;
use carebridge_config::model::AnthropicConfig;
use carebridge_core::traits::{PluginAdapter, ProviderAdapter};
use carebridge_core::{
    AdapterType, CarebridgeError, ContentBlock, HealthStatus, Message, ProviderRequest,
    ProviderResponse, Role, TokenUsage,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{
    ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, ToolDefinition,
};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Creates a provider from the `[anthropic]` config section.
    pub fn new(config: &AnthropicConfig) -> Result<Self, CarebridgeError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            CarebridgeError::Config(
                "no Anthropic API key: set anthropic.api_key or ANTHROPIC_API_KEY".into(),
            )
        })?;
        let client =
            AnthropicClient::new(&api_key, &config.api_version)?.with_base_url(&config.base_url);

        info!(
            primary_model = config.primary_model,
            verification_model = config.verification_model,
            "Anthropic provider initialized"
        );
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }
}

/// Converts a provider-neutral request into the Messages API shape.
pub fn to_message_request(request: &ProviderRequest) -> MessageRequest {
    let tools: Vec<ToolDefinition> = request
        .tools
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();

    MessageRequest {
        model: request.model.clone(),
        messages: to_api_messages(&request.messages),
        system: request.system_prompt.clone(),
        max_tokens: request.max_tokens,
        tools: (!tools.is_empty()).then_some(tools),
    }
}

fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    let mut out: Vec<ApiMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };
        let blocks = message.content.iter().map(to_api_block);
        let continues_previous = out.last().is_some_and(|prev| prev.role == role);
        match out.last_mut() {
            Some(prev) if continues_previous => prev.content.extend(blocks),
            _ => out.push(ApiMessage {
                role: role.to_string(),
                content: blocks.collect(),
            }),
        }
    }
    out
}

fn to_api_block(block: &ContentBlock) -> ApiContentBlock {
    match block {
        ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
        ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => ApiContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.to_string(),
            is_error: is_error.then_some(true),
        },
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError> {
        // No token-consuming probe; construction already validated credentials shape.
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, CarebridgeError> {
        let api_request = to_message_request(&request);
        debug!(
            model = api_request.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.as_ref().map_or(0, Vec::len),
            "sending completion request"
        );
        let response = self.client.complete_message(&api_request).await?;

        let content = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(ContentBlock::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ResponseContentBlock::Unknown => None,
            })
            .collect();

        Ok(ProviderResponse {
            id: response.id,
            model: response.model,
            content,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}
