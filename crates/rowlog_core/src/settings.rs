//! Per-table capture toggles.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Per-table capture flags read by the trigger engine on every mutation.
///
/// Flags are keyed by fully-qualified table name (`main.items`). A table
/// with no explicit flag is treated as enabled, so newly defined tables
/// are captured by default.
///
/// The sync coordinator flips a table's flag off while applying a batch of
/// remote changes and back on afterwards; [`TriggerSettings::disable_scoped`]
/// makes the re-enable automatic on every exit path.
#[derive(Debug, Default)]
pub struct TriggerSettings {
    flags: RwLock<HashMap<String, bool>>,
}

impl TriggerSettings {
    /// Creates settings with no explicit flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capture flag for a table.
    ///
    /// Immediately visible to subsequent mutations.
    pub fn set_capture_enabled(&self, table: &str, enabled: bool) {
        self.flags.write().insert(table.to_owned(), enabled);
    }

    /// Returns the capture flag for a table; defaults to `true`.
    pub fn is_capture_enabled(&self, table: &str) -> bool {
        self.flags.read().get(table).copied().unwrap_or(true)
    }

    /// Disables capture for a table until the returned guard is dropped.
    ///
    /// The guard restores the previous flag value on drop, including when
    /// the scope unwinds with an error or panic. Nesting is safe: the
    /// outermost guard restores the original state.
    pub fn disable_scoped<'a>(&'a self, table: &str) -> CaptureGuard<'a> {
        let previous = self.is_capture_enabled(table);
        self.set_capture_enabled(table, false);
        CaptureGuard {
            settings: self,
            table: table.to_owned(),
            previous,
        }
    }

    /// Runs `f` with capture disabled for a table.
    pub fn with_capture_disabled<R>(&self, table: &str, f: impl FnOnce() -> R) -> R {
        let _guard = self.disable_scoped(table);
        f()
    }
}

/// Scoped capture-disable handle; restores the flag on drop.
#[derive(Debug)]
pub struct CaptureGuard<'a> {
    settings: &'a TriggerSettings,
    table: String,
    previous: bool,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.settings
            .set_capture_enabled(&self.table, self.previous);
    }
}
