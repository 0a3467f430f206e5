// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry and built-in clinical tools for the Carebridge agent.
//!
//! The [`Tool`] trait is the uniform boundary the reasoning loop sees: every
//! EHR read, reference lookup, and the note-drafting action implement it.
//! The [`ToolRegistry`] validates arguments, enforces the per-call timeout,
//! and turns every failure into data for the model.
//!
//! Built-in tools are registered with [`builtin::register_clinical_tools`].

pub mod builtin;
pub mod fhir;
pub mod schema;
pub mod tool;

pub use builtin::{ClinicalCollaborators, PATIENT_PARAM, register_clinical_tools};
pub use tool::{DEFAULT_TOOL_TIMEOUT, Tool, ToolRegistry, success};
