//! Prune command implementation.

use rowlog_core::OplogStore;
use std::path::Path;

/// Runs the prune command.
///
/// Marks entries up to and including `up_to` as acknowledged. The
/// journal only gains a watermark line; `compact` reclaims the space.
pub fn run(path: &Path, up_to: u64) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }

    let mut store = OplogStore::open(path)?;
    let before = store.pending_count();
    store.prune(up_to)?;
    let after = store.pending_count();

    println!(
        "Pruned {} entries up to sequence {} ({} still pending)",
        before - after,
        up_to,
        after
    );
    Ok(())
}
