// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the clinical assistant.
//!
//! Exposes chat turns, draft approval, the pending-draft queue, collaborator
//! health, and clinician feedback over a small JSON API. All conversation
//! state lives in the agent; the gateway only translates requests and maps
//! agent errors onto status codes.

pub mod feedback;
pub mod handlers;
pub mod server;

pub use feedback::{Feedback, FeedbackStore};
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
