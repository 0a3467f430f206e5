// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every external system the core talks to (model inference, the EHR, the
//! reference-data APIs) sits behind one of these traits. All extend
//! [`PluginAdapter`] and use `#[async_trait]` for dynamic dispatch.

pub mod adapter;
pub mod ehr;
pub mod provider;
pub mod reference;

pub use adapter::PluginAdapter;
pub use ehr::EhrAdapter;
pub use provider::ProviderAdapter;
pub use reference::{DrugReferenceAdapter, Icd10Adapter, LiteratureAdapter};
