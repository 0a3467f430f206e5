// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model-inference collaborator trait.

use async_trait::async_trait;

use crate::error::CarebridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for LLM inference.
///
/// A single call is a suspension point of the reasoning loop; transport
/// retries live inside the implementation and are invisible to callers.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
    -> Result<ProviderResponse, CarebridgeError>;
}
