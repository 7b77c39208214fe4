//! The trigger engine: mutation interception and change capture.
//!
//! Database triggers in the original trigger-based design are expressed
//! here as explicit hooks: every mutation path calls the matching hook
//! synchronously before the row change is applied, so capture stays
//! atomic with the mutation without relying on a storage engine's
//! trigger mechanism.

use crate::error::{CoreError, CoreResult};
use crate::settings::TriggerSettings;
use rowlog_protocol::ChangeRecord;
use rowlog_schema::{Row, TableDef};
use std::sync::Arc;

/// Translates row-level mutations into change records.
///
/// Each hook returns `Ok(Some(record))` when the mutation must be
/// captured, `Ok(None)` when capture is disabled for the table.
///
/// Primary-key immutability is enforced by [`TriggerEngine::on_update`]
/// regardless of the capture flag; the original design gates only the
/// oplog triggers, never the immutability check.
#[derive(Debug)]
pub struct TriggerEngine {
    settings: Arc<TriggerSettings>,
}

impl TriggerEngine {
    /// Creates a trigger engine reading the given settings.
    pub fn new(settings: Arc<TriggerSettings>) -> Self {
        Self { settings }
    }

    /// Hook for INSERT of `new`.
    pub fn on_insert(&self, table: &TableDef, new: &Row) -> CoreResult<Option<ChangeRecord>> {
        if !self.capture_enabled(table) {
            return Ok(None);
        }
        let primary_key = table.primary_key_of(new)?;
        Ok(Some(ChangeRecord::insert(
            &table.namespace,
            &table.name,
            primary_key,
            new.clone(),
        )))
    }

    /// Hook for UPDATE from `old` to `new`.
    ///
    /// Fails with [`CoreError::PrimaryKeyImmutable`] if any primary-key
    /// column differs between the two snapshots; the caller must abort
    /// the row change.
    pub fn on_update(
        &self,
        table: &TableDef,
        old: &Row,
        new: &Row,
    ) -> CoreResult<Option<ChangeRecord>> {
        for column in &table.primary_key {
            if old.get(column) != new.get(column) {
                return Err(CoreError::primary_key_immutable(&table.name, column));
            }
        }

        if !self.capture_enabled(table) {
            return Ok(None);
        }
        let primary_key = table.primary_key_of(old)?;
        Ok(Some(ChangeRecord::update(
            &table.namespace,
            &table.name,
            primary_key,
            new.clone(),
            old.clone(),
        )))
    }

    /// Hook for DELETE of `old`.
    pub fn on_delete(&self, table: &TableDef, old: &Row) -> CoreResult<Option<ChangeRecord>> {
        if !self.capture_enabled(table) {
            return Ok(None);
        }
        let primary_key = table.primary_key_of(old)?;
        Ok(Some(ChangeRecord::delete(
            &table.namespace,
            &table.name,
            primary_key,
            old.clone(),
        )))
    }

    fn capture_enabled(&self, table: &TableDef) -> bool {
        self.settings.is_capture_enabled(&table.qualified_name())
    }
}
