//! Transport abstraction for sync.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use rowlog_protocol::{OplogEntry, PullRequest, PullResponse, PushRequest, PushResponse};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Network communication with a remote peer.
///
/// Abstracts the wire so the coordinator can run over HTTP, WebSocket,
/// an in-process peer, or a mock. Implementations carry serialized
/// [`rowlog_protocol`] messages; the coordinator never blocks the local
/// capture path on them.
pub trait SyncTransport: Send + Sync {
    /// Pushes a batch of local oplog entries to the peer.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Pulls remote entries after a cursor.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Returns true if the transport is usable.
    fn is_connected(&self) -> bool;

    /// Closes the connection.
    fn close(&self) -> SyncResult<()>;
}

/// A scripted transport for unit tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    connected: AtomicBool,
    push_response: Mutex<Option<PushResponse>>,
    pull_response: Mutex<Option<PullResponse>>,
    pushed: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a connected mock with no scripted responses.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            push_response: Mutex::new(None),
            pull_response: Mutex::new(None),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// Scripts the push response.
    pub fn set_push_response(&self, response: PushResponse) {
        *self.push_response.lock() = Some(response);
    }

    /// Scripts the pull response.
    pub fn set_pull_response(&self, response: PullResponse) {
        *self.pull_response.lock() = Some(response);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the push requests received so far.
    pub fn pushed_requests(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pushed.lock().push(request.clone());
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no mock push response set".into()))
    }

    fn pull(&self, _request: &PullRequest) -> SyncResult<PullResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pull_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no mock pull response set".into()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct LogSlot {
    origin: u64,
    entry: OplogEntry,
}

#[derive(Debug, Default)]
struct PeerState {
    log: RwLock<Vec<LogSlot>>,
    next_origin: AtomicU64,
}

/// An in-process peer holding a shared change log.
///
/// Each node talks to the peer through its own [`LoopbackConnection`]
/// from [`connect`](LoopbackPeer::connect). The peer tags every stored
/// entry with the connection that pushed it and withholds a
/// connection's own entries from its pulls, so a node never receives an
/// echo of its own changes.
///
/// Cloning shares the peer, letting one instance stand between several
/// coordinators in tests.
#[derive(Debug, Clone, Default)]
pub struct LoopbackPeer {
    state: Arc<PeerState>,
}

/// Origin tag for entries placed in the log by [`LoopbackPeer::seed`].
const SEED_ORIGIN: u64 = 0;

impl LoopbackPeer {
    /// Creates an empty peer.
    pub fn new() -> Self {
        let state = PeerState {
            log: RwLock::new(Vec::new()),
            next_origin: AtomicU64::new(SEED_ORIGIN + 1),
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens a connection with its own origin identity.
    pub fn connect(&self) -> LoopbackConnection {
        LoopbackConnection {
            state: Arc::clone(&self.state),
            origin: self.state.next_origin.fetch_add(1, Ordering::SeqCst),
            acked_sequence: AtomicU64::new(0),
            connected: AtomicBool::new(true),
        }
    }

    /// Returns a copy of the peer's log.
    pub fn log(&self) -> Vec<OplogEntry> {
        self.state
            .log
            .read()
            .iter()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Returns the number of entries in the peer's log.
    pub fn len(&self) -> usize {
        self.state.log.read().len()
    }

    /// Returns true if the peer's log is empty.
    pub fn is_empty(&self) -> bool {
        self.state.log.read().is_empty()
    }

    /// Seeds the peer's log directly, e.g. with remote-origin changes.
    ///
    /// Seeded entries belong to no connection, so every connection
    /// pulls them.
    pub fn seed(&self, entries: impl IntoIterator<Item = OplogEntry>) {
        let mut log = self.state.log.write();
        for entry in entries {
            log.push(LogSlot {
                origin: SEED_ORIGIN,
                entry,
            });
        }
    }
}

/// One node's connection to a [`LoopbackPeer`].
///
/// Pushed entries are deduplicated by sequence number against this
/// connection's acknowledgment high-water mark, so a replayed batch
/// (at-least-once delivery) is acknowledged without being stored twice.
/// Pulls serve the shared log by position, skipping entries this
/// connection pushed; a puller's cursor is simply how far into the log
/// it has read.
#[derive(Debug)]
pub struct LoopbackConnection {
    state: Arc<PeerState>,
    origin: u64,
    acked_sequence: AtomicU64,
    connected: AtomicBool,
}

impl SyncTransport for LoopbackConnection {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let mut log = self.state.log.write();
        for entry in &request.entries {
            entry
                .record
                .check_shape()
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
            // Dedup by sequence: replays of acknowledged entries are skipped.
            if entry.sequence <= self.acked_sequence.load(Ordering::SeqCst) {
                continue;
            }
            self.acked_sequence.store(entry.sequence, Ordering::SeqCst);
            log.push(LogSlot {
                origin: self.origin,
                entry: entry.clone(),
            });
        }

        Ok(PushResponse::success(
            self.acked_sequence.load(Ordering::SeqCst),
        ))
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let log = self.state.log.read();
        let start = (request.cursor as usize).min(log.len());
        let end = (start + request.limit as usize).min(log.len());
        let entries = log[start..end]
            .iter()
            .filter(|slot| slot.origin != self.origin)
            .map(|slot| slot.entry.clone())
            .collect();

        Ok(PullResponse::new(entries, end as u64, end < log.len()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
