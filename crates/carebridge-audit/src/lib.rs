// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident audit trail of patient-data access.
//!
//! Every chat turn that touches patient data, and every approval decision,
//! appends one record. Each record carries the SHA-256 of its predecessor,
//! so editing or deleting a line breaks the chain at that point.

pub mod chain;
pub mod record;
pub mod sink;

pub use chain::{ChainError, verify_file, verify_str};
pub use record::{AuditAction, AuditEntry, AuditRecord, GENESIS_HASH};
pub use sink::{AuditSink, JsonlAuditSink, MemoryAuditSink};
