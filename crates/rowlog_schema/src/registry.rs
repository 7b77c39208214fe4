//! Schema registry.

use crate::error::{SchemaError, SchemaResult};
use crate::table::TableDef;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The authoritative registry of table definitions.
///
/// Definitions are validated when registered and immutable afterwards.
/// Lookups hand out shared references so the trigger engine can hold a
/// definition across a capture without cloning the column list.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: RwLock<BTreeMap<String, Arc<TableDef>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table definition.
    ///
    /// Fails with a [`SchemaError`] if the definition is malformed or the
    /// table name is already taken.
    pub fn define(&self, def: TableDef) -> SchemaResult<Arc<TableDef>> {
        def.validate()?;

        let mut tables = self.tables.write();
        if tables.contains_key(&def.name) {
            return Err(SchemaError::TableExists {
                table: def.name.clone(),
            });
        }

        let def = Arc::new(def);
        tables.insert(def.name.clone(), Arc::clone(&def));
        Ok(def)
    }

    /// Returns the definition for a table.
    pub fn get(&self, table: &str) -> SchemaResult<Arc<TableDef>> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::unknown_table(table))
    }

    /// Returns true if a table is registered.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Returns the registered table names, in order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Returns the number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if no tables are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnType};

    fn simple(name: &str) -> TableDef {
        TableDef::new(
            name,
            vec![
                Column::new("id", ColumnType::Text),
                Column::new("content", ColumnType::Text),
            ],
            vec!["id"],
        )
    }

    #[test]
    fn define_and_get() {
        let registry = SchemaRegistry::new();
        registry.define(simple("items")).unwrap();

        let def = registry.get("items").unwrap();
        assert_eq!(def.name, "items");
        assert!(registry.contains("items"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_table() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(SchemaError::UnknownTable { table }) if table == "nope"
        ));
    }

    #[test]
    fn duplicate_definition_rejected() {
        let registry = SchemaRegistry::new();
        registry.define(simple("items")).unwrap();
        assert!(matches!(
            registry.define(simple("items")),
            Err(SchemaError::TableExists { .. })
        ));
    }

    #[test]
    fn malformed_definition_rejected() {
        let registry = SchemaRegistry::new();
        let def = TableDef::new(
            "bad",
            vec![Column::new("id", ColumnType::Text)],
            Vec::<String>::new(),
        );
        assert!(registry.define(def).is_err());
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn table_names_sorted() {
        let registry = SchemaRegistry::new();
        registry.define(simple("b")).unwrap();
        registry.define(simple("a")).unwrap();
        assert_eq!(registry.table_names(), vec!["a", "b"]);
    }
}
