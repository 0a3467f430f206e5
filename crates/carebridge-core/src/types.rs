// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session store, the reasoning loop, the tool
//! registry, and the collaborator adapters.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generates a fresh random conversation id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a patient in the EHR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Collaborator is fully operational.
    Healthy,
    /// Collaborator is operational but experiencing issues.
    Degraded(String),
    /// Collaborator is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Ehr,
    DrugReference,
    Icd10,
    Literature,
}

// --- Transcript types ---

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A typed block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Natural-language text.
    Text { text: String },
    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The structured result of executing a tool.
    ToolResult {
        tool_use_id: String,
        name: String,
        content: serde_json::Value,
        is_error: bool,
    },
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A plain-text assistant message.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant message carrying arbitrary blocks (text and tool_use).
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A tool message carrying executed tool results.
    pub fn tool_results(invocations: &[ToolInvocation]) -> Self {
        Self {
            role: Role::Tool,
            content: invocations
                .iter()
                .map(|inv| ContentBlock::ToolResult {
                    tool_use_id: inv.call.id.clone(),
                    name: inv.call.name.clone(),
                    content: inv.result.to_json(),
                    is_error: inv.result.is_error(),
                })
                .collect(),
        }
    }

    /// Concatenated text blocks of this message.
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }

    /// Tool calls requested in this message, in order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        collect_tool_calls(&self.content)
    }
}

fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn collect_tool_calls(blocks: &[ContentBlock]) -> Vec<ToolCall> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                name: name.clone(),
                args: input.clone(),
            }),
            _ => None,
        })
        .collect()
}

// --- Tool types ---

/// A model-requested tool call. `args` is subject to sanitization before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// Outcome of executing a tool. Failures are data, never panics or `Err`s.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Structured success payload.
    Success(serde_json::Value),
    /// Normalized failure message.
    Error { message: String },
}

impl ToolResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Wire shape fed back to the model: the payload, or `{"error": true, "message": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Success(payload) => payload.clone(),
            Self::Error { message } => serde_json::json!({
                "error": true,
                "message": message,
            }),
        }
    }

    /// True when the payload marks itself as a draft awaiting clinician sign-off.
    ///
    /// The marker may sit at the top level or inside `data`.
    pub fn requires_human_confirmation(&self) -> bool {
        match self {
            Self::Success(payload) => {
                payload["requires_human_confirmation"].as_bool() == Some(true)
                    || payload["data"]["requires_human_confirmation"].as_bool() == Some(true)
            }
            Self::Error { .. } => false,
        }
    }
}

/// A tool call as actually executed (post-sanitization) together with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call: ToolCall,
    pub result: ToolResult,
}

// --- Provider types ---

/// Token usage statistics for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A request to a model-inference collaborator.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier.
    pub model: String,
    /// System prompt, if any.
    pub system_prompt: Option<String>,
    /// Transcript to send, oldest first.
    pub messages: Vec<Message>,
    /// Tool definitions (`{name, description, input_schema}`); empty disables tool use.
    pub tools: Vec<serde_json::Value>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A full (non-streaming) response from a model-inference collaborator.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub model: String,
    /// Text and tool_use blocks, in the order the model produced them.
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl ProviderResponse {
    /// Concatenated text content.
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }

    /// Tool calls the model requested.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        collect_tool_calls(&self.content)
    }
}

// --- Approval types ---

/// Lifecycle state of a drafted mutating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DraftState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A clinical note to be written to the patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub patient_uuid: PatientId,
    pub note_type: String,
    pub content: String,
}

/// A drafted mutating action awaiting clinician approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub note: ClinicalNote,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    /// Creates a draft that expires `ttl` after `now`. A deadline past the
    /// representable range is clamped to `DateTime::<Utc>::MAX_UTC`.
    pub fn new(note: ClinicalNote, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            note,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// State as observed at `now`, for a draft still held by the store.
    pub fn state_at(&self, now: DateTime<Utc>) -> DraftState {
        if self.is_expired(now) {
            DraftState::Expired
        } else {
            DraftState::Pending
        }
    }
}

// --- Reference-data types ---

/// A candidate concept returned during drug-name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugCandidate {
    pub rxcui: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

/// Result of resolving a free-text drug name to an RxNorm concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResolution {
    pub original_name: String,
    /// Ingredient-level RxCUI, `None` when unresolved.
    pub rxcui: Option<String>,
    /// Canonical (ingredient) name, or the original name when unresolved.
    pub name: String,
    /// 1 exact, 2 approximate, 3 brand/synonym, 4 unresolved.
    pub resolution_tier: u8,
    pub confidence: f64,
    pub ambiguous: bool,
    #[serde(default)]
    pub candidates: Vec<DrugCandidate>,
}

impl DrugResolution {
    /// An unresolved (tier 4) result for `name`.
    pub fn unresolved(name: &str) -> Self {
        Self {
            original_name: name.to_string(),
            rxcui: None,
            name: name.to_string(),
            resolution_tier: 4,
            confidence: 0.0,
            ambiguous: false,
            candidates: Vec::new(),
        }
    }
}

/// A known interaction between two or more drugs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub severity: String,
    pub description: String,
    pub drugs: Vec<String>,
}

/// An ICD-10-CM code with its description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icd10Code {
    pub code: String,
    pub description: String,
}

/// A PubMed article summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub pmid: String,
    pub title: String,
    pub authors: Vec<String>,
    pub source: String,
    pub pubdate: String,
}
