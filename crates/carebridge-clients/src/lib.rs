// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External collaborators for Carebridge.
//!
//! Each client implements one collaborator trait from `carebridge-core`
//! and keeps auth, retries, and wire formats to itself. Callers only ever
//! see [`CarebridgeError::Upstream`](carebridge_core::CarebridgeError) or
//! [`CarebridgeError::Timeout`](carebridge_core::CarebridgeError) on failure.

mod http;
pub mod icd10;
pub mod openemr;
pub mod pubmed;
pub mod rxnav;

pub use icd10::Icd10Client;
pub use openemr::OpenEmrClient;
pub use pubmed::PubMedClient;
pub use rxnav::RxNavClient;
