// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit entry and hash-chained record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;

/// Hash used as `prev_hash` for the first record in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What kind of event touched patient data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    /// A chat turn completed (answered or drafted).
    Turn,
    /// A chat turn aborted (timeout, upstream failure, loop limit).
    TurnFailed,
    /// A draft was approved and written to the EHR.
    DraftApproved,
    /// A draft was rejected by the clinician.
    DraftRejected,
    /// A draft was found expired at decision time.
    DraftExpired,
}

/// An event to append, before chaining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
    pub patient_uuid: Option<String>,
    pub action: AuditAction,
    /// Tool names invoked, in order.
    #[serde(default)]
    pub tools: Vec<String>,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinician_note: Option<String>,
}

/// One persisted line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditRecord {
    /// Chains `entry` after a record whose hash is `prev_hash`.
    pub fn chain(seq: u64, entry: AuditEntry, prev_hash: &str) -> Self {
        let hash = compute_hash(seq, &entry, prev_hash);
        Self {
            seq,
            entry,
            prev_hash: prev_hash.to_string(),
            hash,
        }
    }

    /// Recomputes the hash from the record's own fields.
    pub fn expected_hash(&self) -> String {
        compute_hash(self.seq, &self.entry, &self.prev_hash)
    }
}

fn compute_hash(seq: u64, entry: &AuditEntry, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(seq.to_be_bytes());
    // Serializing a plain struct with string keys cannot fail.
    hasher.update(serde_json::to_vec(entry).unwrap_or_default());
    hex::encode(hasher.finalize())
}
