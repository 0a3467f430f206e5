// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use carebridge_core::{ToolInvocation, ToolResult};

/// The candidate answer plus every tool call executed during the turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnEvidence<'a> {
    pub answer: &'a str,
    pub invocations: &'a [ToolInvocation],
}

impl<'a> TurnEvidence<'a> {
    pub fn new(answer: &'a str, invocations: &'a [ToolInvocation]) -> Self {
        Self {
            answer,
            invocations,
        }
    }

    /// Successful payloads, paired with the tool that produced them.
    pub fn successes(&self) -> impl Iterator<Item = (&'a str, &'a serde_json::Value)> {
        self.invocations.iter().filter_map(|inv| match &inv.result {
            ToolResult::Success(payload) => Some((inv.call.name.as_str(), payload)),
            ToolResult::Error { .. } => None,
        })
    }

    pub fn has_tool_data(&self) -> bool {
        self.successes().next().is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.invocations.iter().any(|inv| inv.result.is_error())
    }

    pub fn called(&self, tool: &str) -> bool {
        self.invocations.iter().any(|inv| inv.call.name == tool)
    }

    /// All successful payloads serialized, one per line.
    pub fn tool_data_text(&self) -> String {
        self.successes()
            .map(|(_, payload)| payload.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
