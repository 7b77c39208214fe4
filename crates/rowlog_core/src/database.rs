//! The embedded database facade.

use crate::capture::TriggerEngine;
use crate::error::{CoreError, CoreResult};
use crate::oplog::OplogStore;
use crate::settings::{CaptureGuard, TriggerSettings};
use crate::storage::StorageResult;
use parking_lot::{Mutex, RwLock};
use rowlog_protocol::OplogEntry;
use rowlog_schema::{Row, SchemaRegistry, TableDef};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// An embedded table store with change capture.
///
/// Every mutation path runs the matching [`TriggerEngine`] hook
/// synchronously: the capture record is appended to the oplog before the
/// row change is applied, and an append failure aborts the mutation, so
/// the table and the log never diverge.
///
/// The database runs embedded in a single connection; interior locks
/// exist to make shared references safe, not to support concurrent
/// writers. Lock order is tables before oplog.
pub struct Database {
    registry: SchemaRegistry,
    settings: Arc<TriggerSettings>,
    triggers: TriggerEngine,
    tables: RwLock<HashMap<String, BTreeMap<Row, Row>>>,
    oplog: Mutex<OplogStore>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.registry.table_names())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database with an ephemeral in-memory oplog.
    pub fn in_memory() -> Self {
        Self::with_store(OplogStore::in_memory())
    }

    /// Creates a database whose oplog is journaled to a file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::with_store(OplogStore::open(path)?))
    }

    /// Creates a database on an existing oplog store.
    pub fn with_store(oplog: OplogStore) -> Self {
        let settings = Arc::new(TriggerSettings::new());
        Self {
            registry: SchemaRegistry::new(),
            triggers: TriggerEngine::new(Arc::clone(&settings)),
            settings,
            tables: RwLock::new(HashMap::new()),
            oplog: Mutex::new(oplog),
        }
    }

    /// Registers a table and initializes its capture flag to enabled.
    pub fn define(&self, def: TableDef) -> CoreResult<()> {
        let def = self.registry.define(def)?;
        self.tables
            .write()
            .insert(def.name.clone(), BTreeMap::new());
        self.settings
            .set_capture_enabled(&def.qualified_name(), true);
        debug!(table = %def.qualified_name(), "table defined");
        Ok(())
    }

    /// Returns the schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Inserts a row.
    ///
    /// Absent columns take their declared defaults. Fails with
    /// [`CoreError::DuplicateKey`] if the primary key already exists.
    pub fn insert(&self, table: &str, row: Row) -> CoreResult<()> {
        let def = self.registry.get(table)?;
        let row = def.normalize_row(row)?;
        let key = def.primary_key_of(&row)?;

        let mut tables = self.tables.write();
        let rows = table_rows(&mut tables, table)?;
        if rows.contains_key(&key) {
            return Err(CoreError::DuplicateKey {
                table: table.to_owned(),
                key: key.to_string(),
            });
        }

        if let Some(record) = self.triggers.on_insert(&def, &row)? {
            let sequence = self.oplog.lock().append(record)?;
            debug!(table, sequence, optype = "INSERT", "captured change");
        }
        rows.insert(key, row);
        Ok(())
    }

    /// Updates the row identified by `key`.
    ///
    /// `new_row` may be partial: columns it omits keep their current
    /// values, as with a SQL UPDATE that names only some columns. The
    /// completed snapshot is what gets captured.
    ///
    /// Fails with [`CoreError::PrimaryKeyImmutable`] if the new snapshot
    /// changes any primary-key column, leaving the row untouched; fails
    /// with [`CoreError::RowNotFound`] if no row matches the key.
    pub fn update(&self, table: &str, key: &Row, new_row: Row) -> CoreResult<()> {
        let def = self.registry.get(table)?;
        let key = def.primary_key_of(key)?;

        let mut tables = self.tables.write();
        let rows = table_rows(&mut tables, table)?;
        let old_row = rows.get(&key).cloned().ok_or_else(|| CoreError::RowNotFound {
            table: table.to_owned(),
            key: key.to_string(),
        })?;

        let mut new_row = new_row;
        for (column, value) in old_row.iter() {
            if !new_row.contains(column) {
                new_row.set(column, value.clone());
            }
        }
        def.validate_row(&new_row)?;

        if let Some(record) = self.triggers.on_update(&def, &old_row, &new_row)? {
            let sequence = self.oplog.lock().append(record)?;
            debug!(table, sequence, optype = "UPDATE", "captured change");
        }
        rows.insert(key, new_row);
        Ok(())
    }

    /// Deletes the row identified by `key`.
    ///
    /// Returns the removed row, or `None` if no row matched (in which
    /// case no capture fires, as with a DELETE affecting zero rows).
    pub fn delete(&self, table: &str, key: &Row) -> CoreResult<Option<Row>> {
        let def = self.registry.get(table)?;
        let key = def.primary_key_of(key)?;

        let mut tables = self.tables.write();
        let rows = table_rows(&mut tables, table)?;
        let Some(old_row) = rows.get(&key).cloned() else {
            return Ok(None);
        };

        if let Some(record) = self.triggers.on_delete(&def, &old_row)? {
            let sequence = self.oplog.lock().append(record)?;
            debug!(table, sequence, optype = "DELETE", "captured change");
        }
        rows.remove(&key);
        Ok(Some(old_row))
    }

    /// Inserts or replaces a row, whichever applies.
    ///
    /// Used when applying remote changes, where the local presence of the
    /// row is not known in advance. Subject to the same capture gate and
    /// primary-key rules as `insert`/`update`.
    pub fn upsert(&self, table: &str, row: Row) -> CoreResult<()> {
        let def = self.registry.get(table)?;
        let row = def.normalize_row(row)?;
        let key = def.primary_key_of(&row)?;

        let mut tables = self.tables.write();
        let rows = table_rows(&mut tables, table)?;

        let record = match rows.get(&key).cloned() {
            Some(old_row) => self.triggers.on_update(&def, &old_row, &row)?,
            None => self.triggers.on_insert(&def, &row)?,
        };
        if let Some(record) = record {
            let optype = record.optype;
            let sequence = self.oplog.lock().append(record)?;
            debug!(table, sequence, %optype, "captured change");
        }
        rows.insert(key, row);
        Ok(())
    }

    /// Returns the row identified by `key`, if present.
    pub fn get(&self, table: &str, key: &Row) -> CoreResult<Option<Row>> {
        let def = self.registry.get(table)?;
        let key = def.primary_key_of(key)?;
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| rowlog_schema::SchemaError::unknown_table(table))?;
        Ok(rows.get(&key).cloned())
    }

    /// Returns every row of a table, in primary-key order.
    pub fn scan(&self, table: &str) -> CoreResult<Vec<Row>> {
        self.registry.get(table)?;
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| rowlog_schema::SchemaError::unknown_table(table))?;
        Ok(rows.values().cloned().collect())
    }

    /// Returns the number of rows in a table.
    pub fn row_count(&self, table: &str) -> CoreResult<usize> {
        Ok(self.scan(table)?.len())
    }

    // --- capture toggles -------------------------------------------------

    /// Sets the capture flag for a registered table.
    pub fn set_capture_enabled(&self, table: &str, enabled: bool) -> CoreResult<()> {
        let def = self.registry.get(table)?;
        self.settings
            .set_capture_enabled(&def.qualified_name(), enabled);
        Ok(())
    }

    /// Returns the capture flag for a registered table.
    pub fn is_capture_enabled(&self, table: &str) -> CoreResult<bool> {
        let def = self.registry.get(table)?;
        Ok(self.settings.is_capture_enabled(&def.qualified_name()))
    }

    /// Disables capture for a table until the returned guard drops.
    pub fn capture_disabled(&self, table: &str) -> CoreResult<CaptureGuard<'_>> {
        let def = self.registry.get(table)?;
        Ok(self.settings.disable_scoped(&def.qualified_name()))
    }

    /// Runs `f` with capture disabled for a table.
    ///
    /// Capture is re-enabled on every exit path, including when `f`
    /// returns an error.
    pub fn with_capture_disabled<R>(
        &self,
        table: &str,
        f: impl FnOnce(&Database) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let _guard = self.capture_disabled(table)?;
        f(self)
    }

    // --- oplog access ----------------------------------------------------

    /// Returns a batch of pending oplog entries in ascending order.
    pub fn drain(&self, limit: usize) -> Vec<OplogEntry> {
        self.oplog.lock().pending_batch(limit)
    }

    /// Removes oplog entries with `sequence <= up_to`. Idempotent.
    pub fn prune(&self, up_to: u64) -> CoreResult<()> {
        self.oplog.lock().prune(up_to)?;
        Ok(())
    }

    /// Returns the number of pending oplog entries.
    pub fn pending_count(&self) -> usize {
        self.oplog.lock().pending_count()
    }

    /// Returns the highest oplog sequence ever assigned (0 when none).
    pub fn last_sequence(&self) -> u64 {
        self.oplog.lock().last_sequence()
    }
}

fn table_rows<'a>(
    tables: &'a mut HashMap<String, BTreeMap<Row, Row>>,
    table: &str,
) -> CoreResult<&'a mut BTreeMap<Row, Row>> {
    tables
        .get_mut(table)
        .ok_or_else(|| rowlog_schema::SchemaError::unknown_table(table).into())
}
