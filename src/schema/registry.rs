//! Schema registry.
//!
//! Metadata store describing every known table: columns, keys, parent
//! relations and export flags. Starts from the built-in GTFS definitions and
//! only ever grows, either through [`SchemaRegistry::merge`] with a schema
//! document or through [`SchemaRegistry::insert`] of a custom table.

use super::{SchemaDocument, TableSchema, builtin};
use crate::{Error, Result};

/// Counts of what a merge added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Tables that were not known before.
    pub tables_added: usize,
    /// Columns appended to already known tables.
    pub columns_added: usize,
    /// Relations added to any table.
    pub relations_added: usize,
    /// Relations dropped because their parent table is unknown.
    pub relations_ignored: usize,
}

impl MergeSummary {
    /// Whether the merge changed anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tables_added == 0 && self.columns_added == 0 && self.relations_added == 0
    }
}

/// Table definitions keyed by name, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    /// Creates a registry with no tables at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self { tables: Vec::new() }
    }

    /// Creates a registry holding the built-in GTFS tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            tables: builtin::tables(),
        }
    }

    /// Looks up a table definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Whether a table is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over all table definitions in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// Returns the number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the registry has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Names of all seed tables.
    pub fn seeds(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(|t| t.seed)
            .map(|t| t.name.as_str())
    }

    /// Whether any table is a custom (non built-in) table.
    #[must_use]
    pub fn has_custom_tables(&self) -> bool {
        self.tables.iter().any(|t| !t.built_in)
    }

    /// Registers a custom table.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken, the table has duplicate
    /// column names, or it refers to columns or parents that do not exist.
    pub fn insert(&mut self, mut table: TableSchema) -> Result<()> {
        if self.contains(&table.name) {
            return Err(Error::InvalidInput(format!(
                "Table already exists: {}",
                table.name
            )));
        }
        validate_columns(&table)?;
        if let Some(relation) = table
            .parents
            .iter()
            .find(|r| r.parent != table.name && !self.contains(&r.parent))
        {
            return Err(Error::InvalidInput(format!(
                "Table {} references unknown parent {}",
                table.name, relation.parent
            )));
        }
        table.built_in = false;
        self.tables.push(table);
        Ok(())
    }

    /// Merges a schema document into the registry.
    ///
    /// Unknown tables are added as custom tables. Known tables gain any
    /// columns and relations they did not have; existing columns keep their
    /// type. Nothing is ever removed. Relations to tables unknown after the
    /// merge are ignored.
    pub fn merge(&mut self, document: &SchemaDocument) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for incoming in &document.tables {
            if let Some(existing) = self.tables.iter_mut().find(|t| t.name == incoming.name) {
                for column in &incoming.columns {
                    if existing.column(&column.name).is_none() {
                        existing.columns.push(column.clone());
                        summary.columns_added += 1;
                    }
                }
            } else {
                let mut table = incoming.clone();
                table.built_in = false;
                table.parents.clear();
                dedup_columns(&mut table);
                table
                    .primary_key
                    .retain(|key| incoming.column(key).is_some());
                self.tables.push(table);
                summary.tables_added += 1;
            }
        }

        // Relations are applied once every table exists so documents may
        // declare children before parents.
        for incoming in &document.tables {
            for relation in &incoming.parents {
                if !self.contains(&relation.parent) {
                    tracing::debug!(
                        table = %incoming.name,
                        parent = %relation.parent,
                        "Ignoring relation to unknown table"
                    );
                    summary.relations_ignored += 1;
                    continue;
                }
                let Some(table) = self.tables.iter_mut().find(|t| t.name == incoming.name) else {
                    continue;
                };
                if !table.parents.contains(relation) {
                    table.parents.push(relation.clone());
                    summary.relations_added += 1;
                }
            }
        }

        summary
    }

    /// Returns this registry extended with `document`.
    #[must_use]
    pub fn extended(mut self, document: &SchemaDocument) -> Self {
        self.merge(document);
        self
    }

    /// Builds the schema document describing every table not excluded from
    /// schema export.
    #[must_use]
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument::new(
            self.tables
                .iter()
                .filter(|t| !t.exclude_from_schema_export)
                .cloned()
                .collect(),
        )
    }
}

fn validate_columns(table: &TableSchema) -> Result<()> {
    for (i, column) in table.columns.iter().enumerate() {
        if table.columns[..i].iter().any(|c| c.name == column.name) {
            return Err(Error::InvalidInput(format!(
                "Table {} declares column {} twice",
                table.name, column.name
            )));
        }
    }
    if let Some(key) = table.primary_key.iter().find(|k| table.column(k).is_none()) {
        return Err(Error::InvalidInput(format!(
            "Table {} has key column {key} that is not declared",
            table.name
        )));
    }
    Ok(())
}

fn dedup_columns(table: &mut TableSchema) {
    let mut seen = std::collections::HashSet::new();
    table.columns.retain(|c| seen.insert(c.name.clone()));
}
