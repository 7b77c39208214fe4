//! Export command implementation.

use rowlog_core::OplogStore;
use std::path::Path;

/// Runs the export command.
///
/// Writes pending entries to stdout, either one JSON object per line
/// (`jsonl`, the journal's own framing) or as a pretty-printed array
/// (`json`).
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }

    let store = OplogStore::open(path)?;
    let entries = store.pending_batch(limit.unwrap_or(usize::MAX));

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            for entry in &entries {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
    }

    tracing::debug!(count = entries.len(), "exported pending entries");
    Ok(())
}
