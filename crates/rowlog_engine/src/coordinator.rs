//! The sync coordinator.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use rowlog_core::Database;
use rowlog_protocol::{OpType, OplogEntry, PullRequest, PushRequest};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The current state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not syncing.
    Idle,
    /// Pulling remote changes.
    Pulling,
    /// Pushing local changes.
    Pushing,
    /// Last cycle completed successfully.
    Synced,
    /// Last cycle failed.
    Error,
    /// Waiting before a retry.
    RetryWait,
}

impl SyncState {
    /// Returns true if a sync is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pulling | SyncState::Pushing)
    }

    /// Returns true if a new cycle may start.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Counters across the coordinator's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed sync cycles.
    pub cycles_completed: u64,
    /// Total entries pulled and applied.
    pub entries_pulled: u64,
    /// Total entries pushed and acknowledged.
    pub entries_pushed: u64,
    /// Total retries.
    pub retries: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Entries pulled and applied.
    pub pulled: u64,
    /// Entries pushed and acknowledged.
    pub pushed: u64,
    /// Whether the cycle completed.
    pub success: bool,
    /// Cycle duration.
    pub duration: Duration,
}

/// Bridges a local database's oplog to a remote peer.
///
/// Outbound, the coordinator drains pending oplog entries in batches,
/// pushes them over the transport, and prunes entries the peer has
/// acknowledged — never before, so an abandoned cycle loses nothing.
///
/// Inbound, remote entries are applied to the application tables with
/// capture disabled for the target table, bracketed by a guard that
/// re-enables capture on every exit path. Remote-origin writes therefore
/// never feed back into the local change stream.
pub struct SyncCoordinator<T: SyncTransport> {
    db: Arc<Database>,
    transport: Arc<T>,
    config: SyncConfig,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cursor: AtomicU64,
    cancelled: AtomicBool,
}

impl<T: SyncTransport> SyncCoordinator<T> {
    /// Creates a coordinator over a database and transport.
    pub fn new(db: Arc<Database>, transport: T, config: SyncConfig) -> Self {
        Self {
            db,
            transport: Arc::new(transport),
            config,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cursor: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a snapshot of the stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the remote cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Sets the remote cursor, e.g. when restored from persisted state.
    pub fn set_cursor(&self, cursor: u64) {
        self.cursor.store(cursor, Ordering::SeqCst);
    }

    /// Cancels an in-flight sync from another thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Performs a full sync cycle: pull, then push.
    pub fn sync(&self) -> SyncResult<SyncCycleResult> {
        let start = Instant::now();
        self.cancelled.store(false, Ordering::SeqCst);

        if !self.state().can_start_sync() {
            return Err(SyncError::AlreadySyncing {
                state: format!("{:?}", self.state()),
            });
        }

        self.set_state(SyncState::Pulling);
        let pulled = match self.pull_remote() {
            Ok(count) => count,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.check_cancelled() {
            return Err(self.fail(e));
        }

        self.set_state(SyncState::Pushing);
        let pushed = match self.push_pending() {
            Ok(count) => count,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(SyncState::Synced);
        let duration = start.elapsed();
        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.last_error = None;
        }
        info!(pulled, pushed, ?duration, "sync cycle complete");

        Ok(SyncCycleResult {
            pulled,
            pushed,
            success: true,
            duration,
        })
    }

    /// Performs a sync, retrying transient failures with backoff.
    pub fn sync_with_retry(&self) -> SyncResult<SyncCycleResult> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                self.set_state(SyncState::RetryWait);
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }

            match self.sync() {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    debug!(attempt, error = %e, "sync attempt failed, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::Protocol("no sync attempts made".into())))
    }

    /// Pulls all available remote entries and applies them locally.
    ///
    /// Returns the number of entries applied. The cursor advances per
    /// batch, so an interrupted pull resumes where it left off.
    pub fn pull_remote(&self) -> SyncResult<u64> {
        let mut total = 0u64;

        loop {
            self.check_cancelled()?;

            let request = PullRequest::new(self.cursor(), self.config.pull_batch_size);
            let response = self.transport.pull(&request)?;

            if !response.entries.is_empty() {
                self.apply_entries(&response.entries)?;
                total += response.entries.len() as u64;
            }
            self.cursor.store(response.new_cursor, Ordering::SeqCst);

            if !response.has_more {
                break;
            }
        }

        if total > 0 {
            self.stats.write().entries_pulled += total;
            debug!(applied = total, cursor = self.cursor(), "pull complete");
        }
        Ok(total)
    }

    /// Pushes all pending local entries, pruning acknowledged ones.
    ///
    /// Returns the number of entries acknowledged. Entries the peer has
    /// not acknowledged stay pending for the next attempt.
    pub fn push_pending(&self) -> SyncResult<u64> {
        let mut total = 0u64;

        loop {
            self.check_cancelled()?;

            let entries = self.db.drain(self.config.push_batch_size);
            let request = PushRequest::new(entries);
            let Some(batch_last) = request.last_sequence() else {
                break;
            };

            let response = self.transport.push(&request)?;
            if !response.success {
                return Err(SyncError::PeerError(
                    response.error.unwrap_or_else(|| "push rejected".into()),
                ));
            }

            let acked = response.acked_sequence.min(batch_last);
            let acked_count = request
                .entries
                .iter()
                .filter(|e| e.sequence <= acked)
                .count() as u64;
            if acked_count == 0 {
                return Err(SyncError::Protocol(
                    "peer acknowledged none of the pushed entries".into(),
                ));
            }

            self.db.prune(acked)?;
            total += acked_count;
            debug!(acked, batch_last, "push batch acknowledged");
        }

        if total > 0 {
            self.stats.write().entries_pushed += total;
        }
        Ok(total)
    }

    /// Applies remote entries to the local tables without re-capture.
    fn apply_entries(&self, entries: &[OplogEntry]) -> SyncResult<()> {
        for entry in entries {
            let record = &entry.record;
            record
                .check_shape()
                .map_err(|e| SyncError::Protocol(e.to_string()))?;

            let def = self
                .db
                .registry()
                .get(&record.tablename)
                .map_err(rowlog_core::CoreError::from)?;
            if def.qualified_name() != record.qualified_table() {
                return Err(SyncError::Protocol(format!(
                    "record addressed to {} but table is registered as {}",
                    record.qualified_table(),
                    def.qualified_name()
                )));
            }

            match record.optype {
                OpType::Insert | OpType::Update => {
                    let new_row = record.new_row.clone().ok_or_else(|| {
                        SyncError::Protocol(format!("missing newRow for {}", record.optype))
                    })?;
                    self.db.with_capture_disabled(&record.tablename, |db| {
                        db.upsert(&record.tablename, new_row)
                    })?;
                }
                OpType::Delete => {
                    // Deleting an already-absent row is fine: at-least-once
                    // delivery can replay a delete.
                    self.db.with_capture_disabled(&record.tablename, |db| {
                        db.delete(&record.tablename, &record.primary_key).map(|_| ())
                    })?;
                }
            }
        }
        Ok(())
    }

    fn fail(&self, error: SyncError) -> SyncError {
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
        error
    }
}
