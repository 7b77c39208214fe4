//! Inspect command implementation.

use rowlog_core::OplogStore;
use rowlog_protocol::OpType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal file path.
    pub path: String,
    /// Journal file size in bytes.
    pub file_size: u64,
    /// Number of pending (unacknowledged) entries.
    pub pending_count: usize,
    /// Highest sequence number ever assigned.
    pub last_sequence: u64,
    /// Lowest pending sequence number, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_pending_sequence: Option<u64>,
    /// Per-table statistics (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableStats>>,
}

/// Pending-entry statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Namespace-qualified table name.
    pub table: String,
    /// Pending inserts.
    pub inserts: usize,
    /// Pending updates.
    pub updates: usize,
    /// Pending deletes.
    pub deletes: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_tables: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }

    let file_size = std::fs::metadata(path)?.len();
    let store = OplogStore::open(path)?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        file_size,
        pending_count: store.pending_count(),
        last_sequence: store.last_sequence(),
        first_pending_sequence: store.first_pending_sequence(),
        tables: None,
    };

    if show_tables {
        let mut per_table: BTreeMap<String, TableStats> = BTreeMap::new();
        for entry in store.drain(usize::MAX) {
            let table = entry.record.qualified_table();
            let stats = per_table.entry(table.clone()).or_insert_with(|| TableStats {
                table,
                inserts: 0,
                updates: 0,
                deletes: 0,
            });
            match entry.record.optype {
                OpType::Insert => stats.inserts += 1,
                OpType::Update => stats.updates += 1,
                OpType::Delete => stats.deletes += 1,
            }
        }
        result.tables = Some(per_table.into_values().collect());
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Journal: {}", result.path);
    println!("  File size:       {} bytes", result.file_size);
    println!("  Pending entries: {}", result.pending_count);
    println!("  Last sequence:   {}", result.last_sequence);
    if let Some(first) = result.first_pending_sequence {
        println!("  First pending:   {}", first);
    }

    if let Some(tables) = &result.tables {
        println!();
        println!("  {:<30} {:>8} {:>8} {:>8}", "Table", "Inserts", "Updates", "Deletes");
        for stats in tables {
            println!(
                "  {:<30} {:>8} {:>8} {:>8}",
                stats.table, stats.inserts, stats.updates, stats.deletes
            );
        }
    }
}
