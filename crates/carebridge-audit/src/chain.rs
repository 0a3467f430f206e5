// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hash-chain verification of a persisted audit log.

use std::path::Path;

use thiserror::Error;

use crate::record::{AuditRecord, GENESIS_HASH};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to read audit log: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed audit record: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },

    #[error("line {line}: expected seq {expected}, found {found}")]
    Sequence {
        line: usize,
        expected: u64,
        found: u64,
    },

    #[error("line {line}: prev_hash does not match the preceding record")]
    BrokenLink { line: usize },

    #[error("line {line}: record hash does not match its contents")]
    Tampered { line: usize },
}

/// Parses and verifies a JSONL audit log, returning its records in order.
pub fn verify_str(contents: &str) -> Result<Vec<AuditRecord>, ChainError> {
    let mut records = Vec::new();
    let mut prev_hash = GENESIS_HASH.to_string();

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let record: AuditRecord =
            serde_json::from_str(raw).map_err(|source| ChainError::Malformed { line, source })?;

        let expected = records.len() as u64;
        if record.seq != expected {
            return Err(ChainError::Sequence {
                line,
                expected,
                found: record.seq,
            });
        }
        if record.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink { line });
        }
        if record.expected_hash() != record.hash {
            return Err(ChainError::Tampered { line });
        }
        prev_hash = record.hash.clone();
        records.push(record);
    }
    Ok(records)
}

/// Reads and verifies the log at `path`.
pub async fn verify_file(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, ChainError> {
    let contents = tokio::fs::read_to_string(path).await?;
    verify_str(&contents)
}
