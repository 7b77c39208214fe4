//! Oplog persistence backends.
//!
//! The oplog store keeps its entries in memory and delegates durability
//! to a backend. Two backends are provided:
//! - [`MemoryBackend`] — no persistence, for tests and ephemeral use
//! - [`JournalBackend`] — a JSON-lines file journal with crash recovery
//!
//! The journal is strictly append-only: both entries and prune watermarks
//! are appended as lines. `compact` rewrites the file to drop entries
//! that fall below the latest watermark.

use rowlog_protocol::{OplogEntry, ProtocolError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by oplog persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Journal payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// The journal violated an invariant on recovery.
    #[error("journal corruption: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

/// Durability backend for the oplog store.
///
/// `append` must make the entry durable before returning; a failure
/// aborts the mutation that produced the entry.
pub trait OplogBackend: Send {
    /// Persists one entry.
    fn append(&mut self, entry: &OplogEntry) -> StorageResult<()>;

    /// Records that entries with `sequence <= up_to` are acknowledged.
    fn prune(&mut self, up_to: u64) -> StorageResult<()>;

    /// Recovers persisted state.
    ///
    /// Returns the un-pruned entries in ascending sequence order and the
    /// highest sequence number ever assigned (0 when none).
    fn recover(&mut self) -> StorageResult<(Vec<OplogEntry>, u64)>;
}

/// A backend that persists nothing.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    /// Creates a memory backend.
    pub fn new() -> Self {
        Self
    }
}

impl OplogBackend for MemoryBackend {
    fn append(&mut self, _entry: &OplogEntry) -> StorageResult<()> {
        Ok(())
    }

    fn prune(&mut self, _up_to: u64) -> StorageResult<()> {
        Ok(())
    }

    fn recover(&mut self) -> StorageResult<(Vec<OplogEntry>, u64)> {
        Ok((Vec::new(), 0))
    }
}

/// One line of the journal file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JournalLine {
    Prune {
        pruned_up_to: u64,
    },
    Entry(OplogEntry),
}

/// A JSON-lines file journal.
///
/// Each appended entry or prune watermark is one line, flushed and synced
/// before the call returns. On open the whole file is replayed: entries
/// at or below the latest watermark are dropped, and sequence numbers are
/// validated to be strictly ascending.
pub struct JournalBackend {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl std::fmt::Debug for JournalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JournalBackend {
    /// Opens (or creates) a journal file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Returns the journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &JournalLine) -> StorageResult<()> {
        let mut bytes = serde_json::to_vec(line).map_err(ProtocolError::from)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn read_lines(path: &Path) -> StorageResult<(Vec<OplogEntry>, u64, u64)> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut entries: Vec<OplogEntry> = Vec::new();
        let mut watermark = 0u64;
        let mut max_sequence = 0u64;

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JournalLine = serde_json::from_str(&line).map_err(|e| {
                StorageError::corrupt(format!("line {}: {e}", number + 1))
            })?;
            match parsed {
                JournalLine::Prune { pruned_up_to } => {
                    watermark = watermark.max(pruned_up_to);
                }
                JournalLine::Entry(entry) => {
                    if entry.sequence <= max_sequence {
                        return Err(StorageError::corrupt(format!(
                            "line {}: sequence {} not ascending",
                            number + 1,
                            entry.sequence
                        )));
                    }
                    max_sequence = entry.sequence;
                    entries.push(entry);
                }
            }
        }

        entries.retain(|e| e.sequence > watermark);
        Ok((entries, max_sequence.max(watermark), watermark))
    }

    /// Rewrites the journal, dropping pruned entries and stale watermarks.
    ///
    /// Used by maintenance tooling; the engine itself only appends.
    pub fn compact(&mut self) -> StorageResult<()> {
        let (entries, _max_sequence, watermark) = Self::read_lines(&self.path)?;

        let tmp_path = self.path.with_extension("compact");
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            if watermark > 0 {
                let mut bytes = serde_json::to_vec(&JournalLine::Prune {
                    pruned_up_to: watermark,
                })
                .map_err(ProtocolError::from)?;
                bytes.push(b'\n');
                writer.write_all(&bytes)?;
            }
            for entry in &entries {
                let mut bytes = entry.encode()?;
                bytes.push(b'\n');
                writer.write_all(&bytes)?;
            }
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().append(true).read(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

impl OplogBackend for JournalBackend {
    fn append(&mut self, entry: &OplogEntry) -> StorageResult<()> {
        self.write_line(&JournalLine::Entry(entry.clone()))
    }

    fn prune(&mut self, up_to: u64) -> StorageResult<()> {
        self.write_line(&JournalLine::Prune { pruned_up_to: up_to })
    }

    fn recover(&mut self) -> StorageResult<(Vec<OplogEntry>, u64)> {
        let (entries, max_sequence, _watermark) = Self::read_lines(&self.path)?;
        Ok((entries, max_sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowlog_protocol::ChangeRecord;
    use rowlog_schema::Row;

    fn entry(sequence: u64) -> OplogEntry {
        OplogEntry::new(
            sequence,
            ChangeRecord::insert(
                "main",
                "items",
                Row::from_pairs([("id", format!("{sequence}"))]),
                Row::from_pairs([
                    ("id", format!("{sequence}")),
                    ("content", "x".to_owned()),
                ]),
            ),
        )
    }

    #[test]
    fn journal_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");

        {
            let mut journal = JournalBackend::open(&path).unwrap();
            journal.append(&entry(1)).unwrap();
            journal.append(&entry(2)).unwrap();
            journal.append(&entry(3)).unwrap();
        }

        let mut journal = JournalBackend::open(&path).unwrap();
        let (entries, max_sequence) = journal.recover().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(max_sequence, 3);
        assert_eq!(entries[0], entry(1));
    }

    #[test]
    fn prune_watermark_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");

        {
            let mut journal = JournalBackend::open(&path).unwrap();
            journal.append(&entry(1)).unwrap();
            journal.append(&entry(2)).unwrap();
            journal.prune(1).unwrap();
        }

        let mut journal = JournalBackend::open(&path).unwrap();
        let (entries, max_sequence) = journal.recover().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 2);
        assert_eq!(max_sequence, 2);
    }

    #[test]
    fn sequence_survives_full_prune() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");

        {
            let mut journal = JournalBackend::open(&path).unwrap();
            journal.append(&entry(1)).unwrap();
            journal.append(&entry(2)).unwrap();
            journal.prune(2).unwrap();
        }

        let mut journal = JournalBackend::open(&path).unwrap();
        let (entries, max_sequence) = journal.recover().unwrap();
        assert!(entries.is_empty());
        // The watermark keeps sequence assignment monotonic across restarts.
        assert_eq!(max_sequence, 2);
    }

    #[test]
    fn compact_drops_pruned_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");

        let mut journal = JournalBackend::open(&path).unwrap();
        journal.append(&entry(1)).unwrap();
        journal.append(&entry(2)).unwrap();
        journal.append(&entry(3)).unwrap();
        journal.prune(2).unwrap();
        journal.compact().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2); // watermark + entry 3

        let (entries, max_sequence) = journal.recover().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 3);
        assert_eq!(max_sequence, 3);

        // Journal stays usable for appends after compaction.
        journal.append(&entry(4)).unwrap();
        let (entries, _) = journal.recover().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn corrupt_line_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");
        std::fs::write(&path, "not json\n").unwrap();

        let mut journal = JournalBackend::open(&path).unwrap();
        assert!(matches!(
            journal.recover(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn non_ascending_sequence_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.journal");

        let mut raw = Vec::new();
        raw.extend(entry(2).encode().unwrap());
        raw.push(b'\n');
        raw.extend(entry(1).encode().unwrap());
        raw.push(b'\n');
        std::fs::write(&path, raw).unwrap();

        let mut journal = JournalBackend::open(&path).unwrap();
        assert!(matches!(
            journal.recover(),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
