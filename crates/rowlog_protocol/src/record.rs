//! Change records.

use crate::error::{ProtocolError, ProtocolResult};
use rowlog_schema::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of mutation a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    /// A new row was created.
    #[serde(rename = "INSERT")]
    Insert,
    /// An existing row was replaced.
    #[serde(rename = "UPDATE")]
    Update,
    /// A row was removed.
    #[serde(rename = "DELETE")]
    Delete,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Insert => write!(f, "INSERT"),
            OpType::Update => write!(f, "UPDATE"),
            OpType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A normalized description of one committed table mutation.
///
/// Change records are immutable once written. Row snapshots are whole-row:
/// `new_row` and `old_row` carry every column of the table, never a diff.
///
/// # Shape invariants
///
/// | optype | `new_row` | `old_row` |
/// |--------|-----------|-----------|
/// | INSERT | full row  | `None`    |
/// | UPDATE | full row  | full row  |
/// | DELETE | `None`    | full row  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Logical database/schema name.
    pub namespace: String,
    /// Table name.
    pub tablename: String,
    /// Mutation kind.
    pub optype: OpType,
    /// Primary-key columns identifying the affected row.
    #[serde(rename = "primaryKey")]
    pub primary_key: Row,
    /// Row snapshot after the mutation (`None` for DELETE).
    #[serde(rename = "newRow")]
    pub new_row: Option<Row>,
    /// Row snapshot before the mutation (`None` for INSERT).
    #[serde(rename = "oldRow")]
    pub old_row: Option<Row>,
    /// Ordering token, assignable by the transport layer.
    pub timestamp: Option<i64>,
}

impl ChangeRecord {
    /// Creates an INSERT record.
    pub fn insert(
        namespace: impl Into<String>,
        tablename: impl Into<String>,
        primary_key: Row,
        new_row: Row,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tablename: tablename.into(),
            optype: OpType::Insert,
            primary_key,
            new_row: Some(new_row),
            old_row: None,
            timestamp: None,
        }
    }

    /// Creates an UPDATE record.
    pub fn update(
        namespace: impl Into<String>,
        tablename: impl Into<String>,
        primary_key: Row,
        new_row: Row,
        old_row: Row,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tablename: tablename.into(),
            optype: OpType::Update,
            primary_key,
            new_row: Some(new_row),
            old_row: Some(old_row),
            timestamp: None,
        }
    }

    /// Creates a DELETE record.
    pub fn delete(
        namespace: impl Into<String>,
        tablename: impl Into<String>,
        primary_key: Row,
        old_row: Row,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tablename: tablename.into(),
            optype: OpType::Delete,
            primary_key,
            new_row: None,
            old_row: Some(old_row),
            timestamp: None,
        }
    }

    /// Returns the fully-qualified table name, e.g. `main.items`.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.namespace, self.tablename)
    }

    /// Checks the shape invariants of this record.
    pub fn check_shape(&self) -> ProtocolResult<()> {
        if self.primary_key.is_empty() {
            return Err(ProtocolError::invalid_record("empty primaryKey"));
        }
        let ok = match self.optype {
            OpType::Insert => self.new_row.is_some() && self.old_row.is_none(),
            OpType::Update => self.new_row.is_some() && self.old_row.is_some(),
            OpType::Delete => self.new_row.is_none() && self.old_row.is_some(),
        };
        if !ok {
            return Err(ProtocolError::invalid_record(format!(
                "row snapshots do not match optype {}",
                self.optype
            )));
        }
        Ok(())
    }

    /// Encodes the record as JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a record from JSON and checks its shape.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        record.check_shape()?;
        Ok(record)
    }
}

/// A change record with its assigned oplog sequence number.
///
/// The sequence is assigned by the oplog store at append time and provides
/// the total order of the change stream. Remote peers may deduplicate by
/// primary key + sequence for exactly-once application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OplogEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// The captured change.
    #[serde(flatten)]
    pub record: ChangeRecord,
}

impl OplogEntry {
    /// Creates an entry.
    pub fn new(sequence: u64, record: ChangeRecord) -> Self {
        Self { sequence, record }
    }

    /// Encodes the entry as JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an entry from JSON and checks the record shape.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let entry: Self = serde_json::from_slice(bytes)?;
        entry.record.check_shape()?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowlog_schema::Value;

    fn item_row() -> Row {
        Row::from_pairs([("id", Value::from("a")), ("content", Value::from("x"))])
    }

    fn pk() -> Row {
        Row::from_pairs([("id", "a")])
    }

    #[test]
    fn insert_shape() {
        let record = ChangeRecord::insert("main", "items", pk(), item_row());
        record.check_shape().unwrap();
        assert_eq!(record.optype, OpType::Insert);
        assert_eq!(record.old_row, None);
        assert_eq!(record.timestamp, None);
        assert_eq!(record.qualified_table(), "main.items");
    }

    #[test]
    fn delete_shape() {
        let record = ChangeRecord::delete("main", "items", pk(), item_row());
        record.check_shape().unwrap();
        assert_eq!(record.new_row, None);
    }

    #[test]
    fn shape_violation_detected() {
        let mut record = ChangeRecord::insert("main", "items", pk(), item_row());
        record.old_row = Some(item_row());
        assert!(record.check_shape().is_err());

        let mut record = ChangeRecord::delete("main", "items", pk(), item_row());
        record.primary_key = Row::new();
        assert!(record.check_shape().is_err());
    }

    #[test]
    fn wire_field_names() {
        let record = ChangeRecord::insert("main", "items", pk(), item_row());
        let json: serde_json::Value =
            serde_json::from_slice(&record.encode().unwrap()).unwrap();

        assert_eq!(json["namespace"], "main");
        assert_eq!(json["tablename"], "items");
        assert_eq!(json["optype"], "INSERT");
        assert_eq!(json["primaryKey"]["id"], "a");
        assert_eq!(json["newRow"]["content"], "x");
        assert!(json["oldRow"].is_null());
        assert!(json["timestamp"].is_null());
    }

    #[test]
    fn record_roundtrip() {
        let record =
            ChangeRecord::update("main", "items", pk(), item_row(), item_row());
        let decoded = ChangeRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn entry_roundtrip_flattens_record() {
        let entry = OplogEntry::new(7, ChangeRecord::insert("main", "items", pk(), item_row()));
        let json: serde_json::Value = serde_json::from_slice(&entry.encode().unwrap()).unwrap();
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["optype"], "INSERT");

        let decoded = OplogEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn decode_rejects_malformed_shape() {
        let record = ChangeRecord::insert("main", "items", pk(), item_row());
        let mut json: serde_json::Value =
            serde_json::from_slice(&record.encode().unwrap()).unwrap();
        json["newRow"] = serde_json::Value::Null;
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(ChangeRecord::decode(&bytes).is_err());
    }
}
