// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Carebridge clinical assistant.
//!
//! This crate provides the error taxonomy, the shared domain types, and the
//! trait definitions every external collaborator (model inference, the EHR,
//! reference-data APIs) is consumed through. Nothing in here performs I/O.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CarebridgeError;
pub use types::{
    AdapterType, Article, ClinicalNote, ContentBlock, ConversationId, DraftState, DrugCandidate,
    DrugInteraction, DrugResolution, HealthStatus, Icd10Code, Message, PatientId, PendingAction,
    ProviderRequest, ProviderResponse, Role, TokenUsage, ToolCall, ToolInvocation, ToolResult,
};

pub use traits::{
    DrugReferenceAdapter, EhrAdapter, Icd10Adapter, LiteratureAdapter, PluginAdapter,
    ProviderAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_client_classification() {
        let conflict = CarebridgeError::PatientBindingConflict {
            conversation_id: "c1".into(),
            bound: "P1".into(),
            requested: "P2".into(),
        };
        assert!(conflict.is_client_error());
        assert_eq!(conflict.kind(), "patient_binding_conflict");

        let timeout = CarebridgeError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        assert!(!timeout.is_client_error());
        assert!(timeout.is_transient());

        assert!(CarebridgeError::NoPendingAction("c1".into()).is_client_error());
        assert!(!CarebridgeError::Internal("x".into()).is_client_error());
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Provider,
            AdapterType::Ehr,
            AdapterType::DrugReference,
            AdapterType::Icd10,
            AdapterType::Literature,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_collaborator_traits_are_exported() {
        fn _provider<T: ProviderAdapter>() {}
        fn _ehr<T: EhrAdapter>() {}
        fn _drugs<T: DrugReferenceAdapter>() {}
        fn _icd10<T: Icd10Adapter>() {}
        fn _literature<T: LiteratureAdapter>() {}
        fn _plugin<T: PluginAdapter>() {}
    }
}
