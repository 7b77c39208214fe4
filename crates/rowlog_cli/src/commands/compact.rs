//! Compact command implementation.

use rowlog_core::{JournalBackend, OplogStore};
use std::path::Path;

/// Runs the compact command.
///
/// Rewrites the journal so it holds one watermark line plus the pending
/// entries, dropping everything already pruned.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }

    let size_before = std::fs::metadata(path)?.len();

    if dry_run {
        let store = OplogStore::open(path)?;
        println!(
            "Would rewrite {:?} ({} bytes) keeping {} pending entries",
            path,
            size_before,
            store.pending_count()
        );
        return Ok(());
    }

    let mut backend = JournalBackend::open(path)?;
    backend.compact()?;

    let size_after = std::fs::metadata(path)?.len();
    println!(
        "Compacted {:?}: {} -> {} bytes",
        path, size_before, size_after
    );
    Ok(())
}
