// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled JSON Schema checks for tool arguments.
//!
//! Each tool's declared input schema is compiled once when the tool is
//! registered and every call is validated against it before the handler runs.

use jsonschema::{ValidationError, Validator};
use serde_json::Value;

/// A tool's input schema, compiled for repeated validation.
pub struct ArgumentSchema {
    validator: Validator,
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema").finish_non_exhaustive()
    }
}

impl ArgumentSchema {
    /// Compiles `schema`, returning the compiler's message if it is not a valid schema.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        jsonschema::validator_for(schema)
            .map(|validator| Self { validator })
            .map_err(|e| e.to_string())
    }

    /// Validates `args`, joining every violation into one human-readable reason.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let errors: Vec<String> = self.validator.iter_errors(args).map(describe).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

fn describe(err: ValidationError<'_>) -> String {
    let path = err.instance_path.to_string();
    if path.is_empty() {
        err.to_string()
    } else {
        format!("{path}: {err}")
    }
}

/// Drops top-level `null` arguments so an explicit null reads as an omitted field.
pub fn strip_nulls(args: Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}
