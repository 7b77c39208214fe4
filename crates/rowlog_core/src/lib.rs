//! # rowlog core
//!
//! The local change-capture engine for rowlog.
//!
//! This crate provides:
//! - `TriggerEngine` — translates row mutations into change records and
//!   enforces primary-key immutability
//! - `OplogStore` — a durable, strictly ordered, append-only change log
//!   with in-memory and file-journal backends
//! - `TriggerSettings` — per-table capture toggles with scoped disabling
//! - `Database` — an embedded table store wiring the pieces together
//!
//! ## Key invariants
//!
//! - Every captured mutation produces exactly one oplog entry, appended
//!   atomically with the mutation (a failed append aborts the write)
//! - Entries are totally ordered by a monotonic sequence number and are
//!   only ever removed by `prune`, after acknowledgment
//! - Primary keys are immutable after row creation, whether or not
//!   capture is enabled for the table
//! - Mutations on a capture-disabled table leave the oplog untouched,
//!   which is how remotely applied changes avoid replication loops

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capture;
mod database;
mod error;
mod oplog;
mod settings;
mod storage;

pub use capture::TriggerEngine;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use oplog::OplogStore;
pub use settings::{CaptureGuard, TriggerSettings};
pub use storage::{JournalBackend, MemoryBackend, OplogBackend, StorageError, StorageResult};
