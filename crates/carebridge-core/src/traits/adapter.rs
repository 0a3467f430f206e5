// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait for every collaborator adapter.

use async_trait::async_trait;

use crate::error::CarebridgeError;
use crate::types::{AdapterType, HealthStatus};

/// Common identity and health surface shared by all adapters.
#[async_trait]
pub trait PluginAdapter: Send + Sync {
    /// Human-readable adapter name (e.g. "anthropic", "openemr").
    fn name(&self) -> &str;

    /// Semantic version of the adapter implementation.
    fn version(&self) -> semver::Version;

    /// Kind of collaborator this adapter fronts.
    fn adapter_type(&self) -> AdapterType;

    /// Reports whether the collaborator is reachable and usable.
    async fn health_check(&self) -> Result<HealthStatus, CarebridgeError>;
}
