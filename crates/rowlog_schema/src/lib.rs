//! # rowlog schema
//!
//! Table definitions, row values and the schema registry for rowlog.
//!
//! This crate provides:
//! - `Value` for scalar column values (null, integer, text)
//! - `Row` as an ordered column → value mapping
//! - `TableDef` / `Column` for static table shapes
//! - `SchemaRegistry` for load-time validated table registration
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod row;
mod table;
mod value;

pub use error::{SchemaError, SchemaResult};
pub use registry::SchemaRegistry;
pub use row::Row;
pub use table::{Column, ColumnType, TableDef};
pub use value::Value;
