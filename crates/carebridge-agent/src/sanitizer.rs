// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pins the patient argument of every tool call to the bound patient.
//!
//! Which parameter identifies the patient comes from the tool's declaration
//! in the registry, never from the argument names the model chose. The
//! rewrite happens on every call, including calls that already carry the
//! right value.

use carebridge_core::{PatientId, ToolCall, ToolInvocation, ToolResult};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result fed back to the model when a patient-scoped tool is requested
/// before any patient is bound.
pub const UNBOUND_MESSAGE: &str =
    "no patient is bound to this conversation; search and confirm a patient first";

/// A model-requested call after sanitization.
#[derive(Debug, Clone, PartialEq)]
pub enum Sanitized {
    /// Safe to execute.
    Ready(ToolCall),
    /// Must not execute; carries the error result to report instead.
    Rejected(ToolInvocation),
}

/// Sanitizes `call` for a tool whose patient parameter is `patient_param`
/// (`None` for tools that never touch patient data).
pub fn sanitize(
    mut call: ToolCall,
    patient_param: Option<&str>,
    bound: Option<&PatientId>,
) -> Sanitized {
    let Some(param) = patient_param else {
        return Sanitized::Ready(call);
    };
    let Some(bound) = bound else {
        warn!(tool = call.name, "patient-scoped tool requested with no bound patient");
        return Sanitized::Rejected(ToolInvocation {
            call,
            result: ToolResult::error(UNBOUND_MESSAGE),
        });
    };

    if !call.args.is_object() {
        call.args = Value::Object(Map::new());
    }

    match call.args.get(param) {
        Some(Value::String(requested)) if requested == bound.as_str() => {
            debug!(tool = call.name, patient_uuid = %bound, "patient argument confirmed");
        }
        None | Some(Value::Null) => {
            debug!(tool = call.name, patient_uuid = %bound, "patient argument filled in");
        }
        Some(requested) => {
            warn!(
                tool = call.name,
                requested = %requested,
                bound = %bound,
                "overriding model-supplied patient id with the bound patient"
            );
        }
    }
    call.args[param] = Value::String(bound.0.clone());
    Sanitized::Ready(call)
}
