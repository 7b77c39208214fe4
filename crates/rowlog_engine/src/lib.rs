//! # rowlog engine
//!
//! The sync coordinator for rowlog.
//!
//! This crate bridges a local [`rowlog_core::Database`]'s oplog to a
//! remote peer:
//! - outbound: drain pending oplog entries, push them over a
//!   [`SyncTransport`], prune on acknowledgment
//! - inbound: pull remote entries from a cursor and apply them to the
//!   application tables with capture disabled, so remote-origin writes
//!   are never re-captured into the local change stream
//!
//! ## Key invariants
//!
//! - Pull always happens before push in a sync cycle
//! - Entries are pruned only after the peer acknowledges them, giving
//!   at-least-once delivery; an abandoned cycle loses nothing
//! - Capture is re-enabled on every exit path of a remote apply,
//!   including errors
//!
//! Conflict resolution is an external policy; the coordinator applies
//! remote rows as given (last writer wins at row granularity).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use coordinator::{SyncCoordinator, SyncCycleResult, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use transport::{LoopbackConnection, LoopbackPeer, MockTransport, SyncTransport};
