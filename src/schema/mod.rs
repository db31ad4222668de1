//! Table metadata.
//!
//! # Architecture
//!
//! - [`ColumnType`], [`ColumnSchema`], [`ParentRelation`] and [`TableSchema`]
//!   describe a single table
//! - [`SchemaRegistry`] holds every known table and grows through merges
//! - [`SchemaDocument`] is the persisted, structure-only form exchanged with
//!   feeds under [`SCHEMA_DOCUMENT_NAME`]
//!
//! The base registry carries the GTFS static tables; anything else is a
//! custom table.

mod builtin;
mod document;
mod registry;
mod types;

pub use builtin::SERVICES_TABLE;
pub use document::{SCHEMA_DOCUMENT_NAME, SchemaDocument};
pub use registry::{MergeSummary, SchemaRegistry};
pub use types::{ColumnSchema, ColumnType, ParentRelation, TableSchema};
