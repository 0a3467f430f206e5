// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Carebridge clinical assistant.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across Carebridge crates.
///
/// Variants follow the turn-level error taxonomy: client errors (binding
/// conflicts, approval errors) leave state untouched and are never retried;
/// upstream and timeout errors abort the turn cleanly; tool failures never
/// surface here at all once the registry has normalized them.
#[derive(Debug, Error)]
pub enum CarebridgeError {
    /// Configuration errors (invalid TOML, missing keys, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A conversation already bound to one patient was asked to operate on another.
    #[error(
        "conversation {conversation_id} is bound to patient {bound}; refusing patient {requested}"
    )]
    PatientBindingConflict {
        conversation_id: String,
        bound: String,
        requested: String,
    },

    /// The model requested a tool that is not in the registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments failed schema validation.
    #[error("invalid input for tool {tool}: {message}")]
    InvalidToolInput { tool: String, message: String },

    /// A tool handler failed (collaborator timeout, HTTP error, bad payload).
    #[error("tool {tool} failed: {message}")]
    Tool {
        tool: String,
        message: String,
        source: Option<BoxedSource>,
    },

    /// The reason/act cycle did not converge within the configured bound.
    #[error("reasoning loop exceeded {iterations} iterations without a final answer")]
    LoopLimitExceeded { iterations: usize },

    /// An approval decision arrived for a conversation with no outstanding draft.
    #[error("no pending action for conversation {0}")]
    NoPendingAction(String),

    /// The outstanding draft passed its expiry and was discarded.
    #[error("draft expired at {expired_at}")]
    DraftExpired { expired_at: String },

    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Model inference errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<BoxedSource>,
    },

    /// An external collaborator (EHR, reference API) could not be reached or answered badly.
    #[error("{service} error: {message}")]
    Upstream {
        service: String,
        message: String,
        source: Option<BoxedSource>,
    },

    /// Session backend failures.
    #[error("session store error: {0}")]
    Session(String),

    /// Audit sink failures.
    #[error("audit error: {source}")]
    Audit { source: BoxedSource },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CarebridgeError {
    /// Shorthand for an upstream collaborator error without a source.
    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// True for errors caused by the caller's request rather than by this service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PatientBindingConflict { .. }
                | Self::NoPendingAction(_)
                | Self::DraftExpired { .. }
                | Self::ConversationNotFound(_)
                | Self::InvalidToolInput { .. }
        )
    }

    /// True for errors worth one retry at the collaborator boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Upstream { .. })
    }

    /// Stable machine-readable name for the error, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::PatientBindingConflict { .. } => "patient_binding_conflict",
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidToolInput { .. } => "invalid_tool_input",
            Self::Tool { .. } => "tool",
            Self::LoopLimitExceeded { .. } => "loop_limit_exceeded",
            Self::NoPendingAction(_) => "no_pending_action",
            Self::DraftExpired { .. } => "draft_expired",
            Self::ConversationNotFound(_) => "conversation_not_found",
            Self::Provider { .. } => "provider",
            Self::Upstream { .. } => "upstream",
            Self::Session(_) => "session",
            Self::Audit { .. } => "audit",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
