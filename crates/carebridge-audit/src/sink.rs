// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit sinks.
//!
//! [`JsonlAuditSink`] appends one JSON line per record and flushes before
//! returning, so an acknowledged append survives a crash. Appends are
//! serialized by a mutex that also guards the chain head.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use carebridge_core::CarebridgeError;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chain::{self, ChainError};
use crate::record::{AuditEntry, AuditRecord, GENESIS_HASH};

/// Append-only destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<AuditRecord, CarebridgeError>;
}

fn audit_error(e: impl std::error::Error + Send + Sync + 'static) -> CarebridgeError {
    CarebridgeError::Audit {
        source: Box::new(e),
    }
}

struct ChainHead {
    next_seq: u64,
    last_hash: String,
}

impl ChainHead {
    fn genesis() -> Self {
        Self {
            next_seq: 0,
            last_hash: GENESIS_HASH.to_string(),
        }
    }

    fn advance(&mut self, entry: AuditEntry) -> AuditRecord {
        let record = AuditRecord::chain(self.next_seq, entry, &self.last_hash);
        self.next_seq += 1;
        self.last_hash = record.hash.clone();
        record
    }
}

/// JSONL file sink with SHA-256 hash chaining.
pub struct JsonlAuditSink {
    path: PathBuf,
    head: Mutex<ChainHead>,
}

impl JsonlAuditSink {
    /// Opens (or creates) the log at `path`, verifying any existing chain and
    /// resuming after its last record.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CarebridgeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(audit_error)?;
        }

        let head = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let records = chain::verify_str(&contents).map_err(audit_error)?;
                match records.last() {
                    Some(last) => ChainHead {
                        next_seq: last.seq + 1,
                        last_hash: last.hash.clone(),
                    },
                    None => ChainHead::genesis(),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ChainHead::genesis(),
            Err(e) => return Err(audit_error(e)),
        };

        info!(path = %path.display(), next_seq = head.next_seq, "audit log opened");
        Ok(Self {
            path,
            head: Mutex::new(head),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<AuditRecord, CarebridgeError> {
        let mut head = self.head.lock().await;
        let record = AuditRecord::chain(head.next_seq, entry, &head.last_hash);

        let mut line = serde_json::to_string(&record).map_err(audit_error)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(audit_error)?;
        file.write_all(line.as_bytes()).await.map_err(audit_error)?;
        file.flush().await.map_err(audit_error)?;

        // Only advance once the line is durable.
        head.next_seq = record.seq + 1;
        head.last_hash = record.hash.clone();
        debug!(
            seq = record.seq,
            action = %record.entry.action,
            conversation_id = %record.entry.conversation_id,
            "audit record appended"
        );
        Ok(record)
    }
}

/// In-memory sink, chained the same way. Used when the file sink is disabled
/// and in tests.
pub struct MemoryAuditSink {
    head: Mutex<ChainHead>,
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            head: Mutex::new(ChainHead::genesis()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<AuditRecord, CarebridgeError> {
        let record = self.head.lock().await.advance(entry);
        self.records.lock().await.push(record.clone());
        Ok(record)
    }
}

impl From<ChainError> for CarebridgeError {
    fn from(e: ChainError) -> Self {
        audit_error(e)
    }
}
