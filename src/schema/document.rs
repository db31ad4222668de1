//! Persisted schema document.
//!
//! A structural-only description of tables (names, columns, types, keys and
//! relations) stored next to the data under [`SCHEMA_DOCUMENT_NAME`]. Read at
//! import to extend the registry, written at export when custom tables exist.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::TableSchema;
use crate::{Error, Result};

/// Well-known file name of the schema document.
pub const SCHEMA_DOCUMENT_NAME: &str = "gtfs.schema.json";

/// Table definitions without any row data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Table definitions in registry order.
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl SchemaDocument {
    /// Creates a document from table definitions.
    #[must_use]
    pub const fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// Parses a document from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid schema document.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut document: Self =
            serde_json::from_reader(reader).map_err(|e| Error::failed("read_schema_document", e))?;
        for table in &mut document.tables {
            table.built_in = false;
        }
        Ok(document)
    }

    /// Writes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or I/O fails.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| Error::failed("write_schema_document", e))?;
        writeln!(writer).map_err(|e| Error::failed("write_schema_document", e))?;
        Ok(())
    }

    /// Looks up a table definition by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}
