//! # rowlog protocol
//!
//! Change records and replication protocol messages for rowlog.
//!
//! This crate provides:
//! - `ChangeRecord` — the normalized description of one table mutation
//! - `OplogEntry` — a change record with its assigned sequence number
//! - push/pull protocol messages
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations. Any transport
//! (HTTP, WebSocket, direct function call) may carry the messages.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod record;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{PullRequest, PullResponse, PushRequest, PushResponse};
pub use record::{ChangeRecord, OpType, OplogEntry};
