//! Static table definitions.

use crate::error::{SchemaError, SchemaResult};
use crate::row::Row;
use crate::value::Value;
use std::fmt;

/// Scalar type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// Signed 64-bit integer.
    Integer,
}

impl ColumnType {
    /// Returns true if the value conforms to this column type.
    ///
    /// `Null` conforms to every type; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Text, Value::Text(_)) => true,
            (ColumnType::Integer, Value::Integer(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Integer => write!(f, "INTEGER"),
        }
    }
}

/// A single column in a table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Scalar type.
    pub column_type: ColumnType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value applied when the column is absent on insert.
    pub default: Option<Value>,
}

impl Column {
    /// Creates a non-nullable column with no default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
        }
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column default.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// The authoritative shape of one application table.
///
/// # Invariants
///
/// Enforced by [`TableDef::validate`] at registration time:
/// - the primary key is non-empty
/// - every primary-key column exists and is not nullable
/// - column names are unique
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Logical database/schema name (`main` unless specified).
    pub namespace: String,
    /// Table name.
    pub name: String,
    /// Ordered column list.
    pub columns: Vec<Column>,
    /// Primary-key column names.
    pub primary_key: Vec<String>,
}

impl TableDef {
    /// Creates a table definition in the `main` namespace.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key: Vec<impl Into<String>>,
    ) -> Self {
        Self {
            namespace: "main".to_owned(),
            name: name.into(),
            columns,
            primary_key: primary_key.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the fully-qualified table name, e.g. `main.items`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks the structural invariants of this definition.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.primary_key.is_empty() {
            return Err(SchemaError::EmptyPrimaryKey {
                table: self.name.clone(),
            });
        }

        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        for pk in &self.primary_key {
            match self.column(pk) {
                None => {
                    return Err(SchemaError::UnknownPrimaryKeyColumn {
                        table: self.name.clone(),
                        column: pk.clone(),
                    })
                }
                Some(column) if column.nullable => {
                    return Err(SchemaError::NullablePrimaryKey {
                        table: self.name.clone(),
                        column: pk.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Validates a full row snapshot against this definition.
    ///
    /// Every column of the definition must be present with a conforming
    /// value; columns unknown to the definition are rejected.
    pub fn validate_row(&self, row: &Row) -> SchemaResult<()> {
        for column in row.columns() {
            if self.column(column).is_none() {
                return Err(SchemaError::UnknownColumn {
                    table: self.name.clone(),
                    column: column.to_owned(),
                });
            }
        }

        for column in &self.columns {
            let value = row.get(&column.name).ok_or_else(|| SchemaError::MissingColumn {
                table: self.name.clone(),
                column: column.name.clone(),
            })?;

            if value.is_null() {
                if !column.nullable {
                    return Err(SchemaError::NullViolation {
                        table: self.name.clone(),
                        column: column.name.clone(),
                    });
                }
                continue;
            }

            if !column.column_type.accepts(value) {
                return Err(SchemaError::TypeMismatch {
                    table: self.name.clone(),
                    column: column.name.clone(),
                    expected: column.column_type.to_string(),
                    actual: value.type_name().to_owned(),
                });
            }
        }

        Ok(())
    }

    /// Completes a partial insert row into a full snapshot.
    ///
    /// Absent columns take their declared default, or NULL when nullable.
    /// The completed row is validated before being returned.
    pub fn normalize_row(&self, mut row: Row) -> SchemaResult<Row> {
        for column in &self.columns {
            if row.contains(&column.name) {
                continue;
            }
            match (&column.default, column.nullable) {
                (Some(default), _) => row.set(&column.name, default.clone()),
                (None, true) => row.set(&column.name, Value::Null),
                (None, false) => {
                    return Err(SchemaError::MissingColumn {
                        table: self.name.clone(),
                        column: column.name.clone(),
                    })
                }
            }
        }

        self.validate_row(&row)?;
        Ok(row)
    }

    /// Projects a row onto the primary-key columns.
    pub fn primary_key_of(&self, row: &Row) -> SchemaResult<Row> {
        let mut key = Row::new();
        for pk in &self.primary_key {
            let value = row.get(pk).ok_or_else(|| SchemaError::MissingColumn {
                table: self.name.clone(),
                column: pk.clone(),
            })?;
            key.set(pk, value.clone());
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> TableDef {
        TableDef::new(
            "items",
            vec![
                Column::new("id", ColumnType::Text),
                Column::new("content", ColumnType::Text),
                Column::new("content_text_null", ColumnType::Text).nullable(),
                Column::new("content_text_null_default", ColumnType::Text)
                    .nullable()
                    .with_default(""),
                Column::new("intvalue_null", ColumnType::Integer).nullable(),
                Column::new("intvalue_null_default", ColumnType::Integer)
                    .nullable()
                    .with_default(10i64),
            ],
            vec!["id"],
        )
    }

    #[test]
    fn valid_definition() {
        assert!(items().validate().is_ok());
        assert_eq!(items().qualified_name(), "main.items");
    }

    #[test]
    fn empty_primary_key_rejected() {
        let def = TableDef::new(
            "t",
            vec![Column::new("id", ColumnType::Text)],
            Vec::<String>::new(),
        );
        assert!(matches!(
            def.validate(),
            Err(SchemaError::EmptyPrimaryKey { .. })
        ));
    }

    #[test]
    fn unknown_primary_key_column_rejected() {
        let def = TableDef::new("t", vec![Column::new("id", ColumnType::Text)], vec!["nope"]);
        assert!(matches!(
            def.validate(),
            Err(SchemaError::UnknownPrimaryKeyColumn { .. })
        ));
    }

    #[test]
    fn nullable_primary_key_rejected() {
        let def = TableDef::new(
            "t",
            vec![Column::new("id", ColumnType::Text).nullable()],
            vec!["id"],
        );
        assert!(matches!(
            def.validate(),
            Err(SchemaError::NullablePrimaryKey { .. })
        ));
    }

    #[test]
    fn duplicate_column_rejected() {
        let def = TableDef::new(
            "t",
            vec![
                Column::new("id", ColumnType::Text),
                Column::new("id", ColumnType::Integer),
            ],
            vec!["id"],
        );
        assert!(matches!(
            def.validate(),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn normalize_applies_defaults() {
        let row = Row::from_pairs([("id", "a"), ("content", "x")]);
        let full = items().normalize_row(row).unwrap();

        assert_eq!(full.get("content_text_null"), Some(&Value::Null));
        assert_eq!(full.get("content_text_null_default"), Some(&Value::from("")));
        assert_eq!(full.get("intvalue_null"), Some(&Value::Null));
        assert_eq!(full.get("intvalue_null_default"), Some(&Value::Integer(10)));
    }

    #[test]
    fn normalize_rejects_missing_required() {
        let row = Row::from_pairs([("id", "a")]);
        assert!(matches!(
            items().normalize_row(row),
            Err(SchemaError::MissingColumn { column, .. }) if column == "content"
        ));
    }

    #[test]
    fn validate_row_rejects_unknown_column() {
        let row = Row::from_pairs([("id", "a"), ("content", "x"), ("extra", "y")]);
        assert!(matches!(
            items().validate_row(&row),
            Err(SchemaError::UnknownColumn { column, .. }) if column == "extra"
        ));
    }

    #[test]
    fn validate_row_rejects_type_mismatch() {
        let def = items();
        let row = def
            .normalize_row(Row::from_pairs([("id", "a"), ("content", "x")]))
            .unwrap()
            .with("intvalue_null", "not an int");
        assert!(matches!(
            def.validate_row(&row),
            Err(SchemaError::TypeMismatch { column, .. }) if column == "intvalue_null"
        ));
    }

    #[test]
    fn validate_row_rejects_null_in_required() {
        let def = items();
        let row = def
            .normalize_row(Row::from_pairs([("id", "a"), ("content", "x")]))
            .unwrap()
            .with("content", Value::Null);
        assert!(matches!(
            def.validate_row(&row),
            Err(SchemaError::NullViolation { column, .. }) if column == "content"
        ));
    }

    #[test]
    fn primary_key_projection() {
        let def = items();
        let row = def
            .normalize_row(Row::from_pairs([("id", "a"), ("content", "x")]))
            .unwrap();
        assert_eq!(
            def.primary_key_of(&row).unwrap(),
            Row::from_pairs([("id", "a")])
        );
    }
}
