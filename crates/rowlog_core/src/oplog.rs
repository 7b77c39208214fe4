//! The append-only oplog store.

use crate::storage::{JournalBackend, MemoryBackend, OplogBackend, StorageResult};
use rowlog_protocol::{ChangeRecord, OplogEntry};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

/// A durable, strictly ordered, append-only sequence of change records.
///
/// # Invariants
///
/// - Sequence numbers are assigned at append time, monotonically
///   increasing, and never reused (they survive restart and full prune)
/// - Entries are removed only by [`OplogStore::prune`], so an abandoned
///   drain loses nothing
/// - A failed backend append leaves the store unchanged, letting the
///   caller abort the mutation that produced the record
pub struct OplogStore {
    entries: VecDeque<OplogEntry>,
    last_sequence: u64,
    backend: Box<dyn OplogBackend>,
}

impl fmt::Debug for OplogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OplogStore")
            .field("pending", &self.entries.len())
            .field("last_sequence", &self.last_sequence)
            .finish_non_exhaustive()
    }
}

impl OplogStore {
    /// Creates an ephemeral in-memory store.
    pub fn in_memory() -> Self {
        Self {
            entries: VecDeque::new(),
            last_sequence: 0,
            backend: Box::new(MemoryBackend::new()),
        }
    }

    /// Opens a store backed by a journal file, recovering persisted state.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_backend(Box::new(JournalBackend::open(path)?))
    }

    /// Creates a store on an arbitrary backend, recovering its state.
    pub fn with_backend(mut backend: Box<dyn OplogBackend>) -> StorageResult<Self> {
        let (entries, last_sequence) = backend.recover()?;
        Ok(Self {
            entries: entries.into(),
            last_sequence,
            backend,
        })
    }

    /// Appends a record, assigning the next sequence number.
    ///
    /// Returns the assigned sequence. Fails only on backend I/O error,
    /// in which case nothing is appended.
    pub fn append(&mut self, record: ChangeRecord) -> StorageResult<u64> {
        let sequence = self.last_sequence + 1;
        let entry = OplogEntry::new(sequence, record);
        self.backend.append(&entry)?;
        self.last_sequence = sequence;
        self.entries.push_back(entry);
        Ok(sequence)
    }

    /// Iterates over pending entries in ascending sequence order.
    ///
    /// Non-consuming: entries stay pending until [`OplogStore::prune`].
    /// A drain abandoned part-way through can simply be restarted.
    pub fn drain(&self, limit: usize) -> impl Iterator<Item = &OplogEntry> {
        self.entries.iter().take(limit)
    }

    /// Returns a cloned batch of pending entries.
    pub fn pending_batch(&self, limit: usize) -> Vec<OplogEntry> {
        self.drain(limit).cloned().collect()
    }

    /// Removes entries with `sequence <= up_to`. Idempotent.
    pub fn prune(&mut self, up_to: u64) -> StorageResult<()> {
        if self
            .entries
            .front()
            .map(|e| e.sequence > up_to)
            .unwrap_or(true)
        {
            // Nothing to remove; skip the backend watermark write.
            return Ok(());
        }

        self.backend.prune(up_to)?;
        while let Some(front) = self.entries.front() {
            if front.sequence <= up_to {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Returns the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the highest sequence number ever assigned (0 when none).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Returns the sequence of the oldest pending entry, if any.
    pub fn first_pending_sequence(&self) -> Option<u64> {
        self.entries.front().map(|e| e.sequence)
    }
}
