// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory clinician feedback. Lost on restart.

use carebridge_core::ConversationId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// One rating left by a clinician.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub conversation_id: Option<ConversationId>,
    /// 1 (poor) to 5 (excellent).
    pub rating: u8,
    pub comment: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct FeedbackStore {
    entries: Mutex<Vec<Feedback>>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry and returns how many are held.
    pub async fn record(&self, feedback: Feedback) -> usize {
        let mut entries = self.entries.lock().await;
        entries.push(feedback);
        entries.len()
    }

    pub async fn entries(&self) -> Vec<Feedback> {
        self.entries.lock().await.clone()
    }
}
