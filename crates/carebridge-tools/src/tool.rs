// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! Every capability the model can call implements [`Tool`]. The
//! [`ToolRegistry`] indexes tools by name, produces Anthropic-format tool
//! definitions, validates arguments against each tool's declared schema, and
//! normalizes every failure into a [`ToolResult::Error`] so the reasoning
//! loop never sees a tool `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carebridge_core::{CarebridgeError, ToolCall, ToolResult};
use tracing::{debug, warn};

use crate::schema::{self, ArgumentSchema};

/// Default per-invocation budget.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A named, schema-typed capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for lookup and in the provider's tool definitions.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// The schema property that identifies the patient, if this tool is
    /// patient-scoped. Its value is overwritten with the session binding
    /// before every invocation.
    fn patient_param(&self) -> Option<&str> {
        None
    }

    /// Runs the tool. Arguments have already passed schema validation.
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, CarebridgeError>;
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    schema: ArgumentSchema,
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Sets the wall-clock budget applied to each invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers a tool under its `name()`, replacing any previous entry.
    ///
    /// Fails if the tool's declared input schema does not compile.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), CarebridgeError> {
        let schema = ArgumentSchema::compile(&tool.parameters_schema()).map_err(|e| {
            CarebridgeError::Internal(format!("tool '{}' has an invalid input schema: {e}", tool.name()))
        })?;
        self.tools
            .insert(tool.name().to_string(), RegisteredTool { tool, schema });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.tool.clone())
    }

    /// Patient parameter declared by `name`, if the tool exists and is patient-scoped.
    pub fn patient_param(&self, name: &str) -> Option<String> {
        self.tools
            .get(name)
            .and_then(|t| t.tool.patient_param().map(str::to_string))
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Anthropic-format definitions (`name`, `description`, `input_schema`), sorted by name.
    pub fn tool_definitions(&self) -> Vec<serde_json::Value> {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().map(|t| &t.tool).collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.parameters_schema(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validates and runs a call. Never fails: unknown tools, invalid input,
    /// handler errors, and timeouts all come back as [`ToolResult::Error`].
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let Some(RegisteredTool { tool, schema: input_schema }) = self.tools.get(&call.name) else {
            warn!(tool = call.name, "model requested unknown tool");
            return ToolResult::error(CarebridgeError::UnknownTool(call.name.clone()).to_string());
        };

        let args = schema::strip_nulls(call.args.clone());
        if let Err(message) = input_schema.validate(&args) {
            debug!(tool = call.name, %message, "tool input rejected");
            return ToolResult::error(
                CarebridgeError::InvalidToolInput {
                    tool: call.name.clone(),
                    message,
                }
                .to_string(),
            );
        }

        match tokio::time::timeout(self.timeout, tool.invoke(args)).await {
            Ok(Ok(payload)) => {
                debug!(tool = call.name, "tool succeeded");
                ToolResult::Success(payload)
            }
            Ok(Err(CarebridgeError::Timeout { .. })) | Err(_) => {
                warn!(tool = call.name, timeout = ?self.timeout, "tool timed out");
                ToolResult::error(format!("Tool '{}' timed out. Try again.", call.name))
            }
            Ok(Err(e)) => {
                warn!(tool = call.name, error = %e, "tool failed");
                ToolResult::error(format!("Tool '{}' failed: {e}", call.name))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps tool data in the `{"status": "success", "data": ...}` envelope.
pub fn success(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "status": "success", "data": data })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn invoke(
            &self,
            input: serde_json::Value,
        ) -> Result<serde_json::Value, CarebridgeError> {
            Ok(success(input))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        fn patient_param(&self) -> Option<&str> {
            Some("patient_uuid")
        }

        async fn invoke(&self, _: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
            Err(CarebridgeError::upstream("ehr", "returned 503 Service Unavailable"))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(serde_json::Value::Null)
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "tu_1".into(),
            name: name.into(),
            args,
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(5));
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();
        registry
    }

    #[test]
    fn definitions_are_sorted_and_complete() {
        let defs = registry().tool_definitions();
        let names: Vec<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(names, vec!["echo", "fail", "slow"]);
        assert_eq!(defs[0]["input_schema"]["type"], "object");
    }

    #[test]
    fn patient_param_is_exposed_per_tool() {
        let registry = registry();
        assert_eq!(registry.patient_param("fail").as_deref(), Some("patient_uuid"));
        assert_eq!(registry.patient_param("echo"), None);
        assert_eq!(registry.patient_param("missing"), None);
    }

    #[tokio::test]
    async fn success_payload_is_passed_through() {
        let result = registry()
            .invoke(&call("echo", serde_json::json!({"message": "hi"})))
            .await;
        assert_eq!(
            result,
            ToolResult::Success(serde_json::json!({
                "status": "success",
                "data": {"message": "hi"}
            }))
        );
    }

    #[tokio::test]
    async fn handler_error_becomes_error_result() {
        let result = registry().invoke(&call("fail", serde_json::json!({}))).await;
        match result {
            ToolResult::Error { message } => {
                assert!(message.starts_with("Tool 'fail' failed:"), "{message}");
                assert!(message.contains("503"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let result = registry().invoke(&call("nope", serde_json::json!({}))).await;
        assert!(matches!(result, ToolResult::Error { ref message } if message.contains("unknown tool")));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_invocation() {
        let result = registry()
            .invoke(&call("echo", serde_json::json!({"message": 42})))
            .await;
        assert!(
            matches!(result, ToolResult::Error { ref message } if message.contains("invalid input for tool echo"))
        );
    }

    #[tokio::test]
    async fn explicit_null_for_required_field_is_rejected() {
        let result = registry()
            .invoke(&call("echo", serde_json::json!({"message": null})))
            .await;
        assert!(
            matches!(result, ToolResult::Error { ref message } if message.contains("\"message\" is a required property")),
            "{result:?}"
        );
    }

    struct BrokenSchemaTool;

    #[async_trait]
    impl Tool for BrokenSchemaTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Declares an unusable schema"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": 12})
        }

        async fn invoke(&self, _: serde_json::Value) -> Result<serde_json::Value, CarebridgeError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[test]
    fn tool_with_invalid_schema_is_not_registered() {
        let mut registry = ToolRegistry::new();
        let err = registry.register(Arc::new(BrokenSchemaTool)).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let result = registry().invoke(&call("slow", serde_json::json!({}))).await;
        assert_eq!(result, ToolResult::error("Tool 'slow' timed out. Try again."));
    }
}
