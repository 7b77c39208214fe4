//! Replication protocol messages.

use crate::record::OplogEntry;
use serde::{Deserialize, Serialize};

/// A batch of locally captured changes pushed to the remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Oplog entries in ascending sequence order.
    pub entries: Vec<OplogEntry>,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(entries: Vec<OplogEntry>) -> Self {
        Self { entries }
    }

    /// Returns the highest sequence number in the batch, if any.
    pub fn last_sequence(&self) -> Option<u64> {
        self.entries.last().map(|e| e.sequence)
    }
}

/// The peer's acknowledgment of a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the batch was accepted.
    pub success: bool,
    /// Error message when rejected.
    pub error: Option<String>,
    /// Highest sequence number durably accepted by the peer.
    ///
    /// Entries up to this bound may be pruned from the local oplog.
    pub acked_sequence: u64,
}

impl PushResponse {
    /// Creates a successful acknowledgment.
    pub fn success(acked_sequence: u64) -> Self {
        Self {
            success: true,
            error: None,
            acked_sequence,
        }
    }

    /// Creates a rejection.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            acked_sequence: 0,
        }
    }
}

/// A request for remote changes after a cursor position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Opaque resume position assigned by the peer: `0` to read from the
    /// start, thereafter the `new_cursor` of the previous response.
    pub cursor: u64,
    /// Maximum number of entries to return.
    pub limit: u32,
}

impl PullRequest {
    /// Creates a pull request.
    pub fn new(cursor: u64, limit: u32) -> Self {
        Self { cursor, limit }
    }
}

/// A batch of remote changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Remote entries in ascending sequence order.
    pub entries: Vec<OplogEntry>,
    /// Cursor to resume from on the next pull.
    pub new_cursor: u64,
    /// Whether more entries are available beyond this batch.
    pub has_more: bool,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(entries: Vec<OplogEntry>, new_cursor: u64, has_more: bool) -> Self {
        Self {
            entries,
            new_cursor,
            has_more,
        }
    }

    /// Creates an empty response at the given cursor.
    pub fn empty(cursor: u64) -> Self {
        Self::new(Vec::new(), cursor, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChangeRecord;
    use rowlog_schema::Row;

    fn entry(sequence: u64) -> OplogEntry {
        OplogEntry::new(
            sequence,
            ChangeRecord::insert(
                "main",
                "items",
                Row::from_pairs([("id", "a")]),
                Row::from_pairs([("id", "a"), ("content", "x")]),
            ),
        )
    }

    #[test]
    fn push_last_sequence() {
        assert_eq!(PushRequest::new(vec![]).last_sequence(), None);
        assert_eq!(
            PushRequest::new(vec![entry(1), entry(2)]).last_sequence(),
            Some(2)
        );
    }

    #[test]
    fn push_response_constructors() {
        let ok = PushResponse::success(5);
        assert!(ok.success);
        assert_eq!(ok.acked_sequence, 5);

        let err = PushResponse::error("rejected");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn pull_response_empty() {
        let response = PullResponse::empty(9);
        assert!(response.entries.is_empty());
        assert_eq!(response.new_cursor, 9);
        assert!(!response.has_more);
    }

    #[test]
    fn message_roundtrip() {
        let request = PushRequest::new(vec![entry(3)]);
        let bytes = serde_json::to_vec(&request).unwrap();
        let back: PushRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, request);
    }
}
