// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Carebridge integration tests.
//!
//! Mock collaborators and a harness for fast, deterministic tests that need
//! no model API, EHR, or network access.
//!
//! # Components
//!
//! - [`ScriptedProvider`] - model provider that replays queued responses
//! - [`MockEhr`] - EHR serving fixture patients and counting note writes
//! - [`MockDrugReference`], [`MockIcd10`], [`MockLiterature`] - reference data
//! - [`TestHarness`] - a wired [`ClinicalAgent`](carebridge_agent::ClinicalAgent)

pub mod harness;
pub mod mock_ehr;
pub mod mock_provider;
pub mod mock_reference;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_ehr::{EhrCall, MockEhr, PatientFixture, bundle, john_doe, maria_santos};
pub use mock_provider::{ScriptedProvider, text_response, tool_use_response};
pub use mock_reference::{MockDrugReference, MockIcd10, MockLiterature};
