//! In-memory tables.
//!
//! A [`Table`] pairs a [`TableSchema`] with an insertion-ordered list of
//! [`Row`]s. Rows are positional: cell `i` belongs to column `i`.

mod value;

pub use value::{Duration, Value};

use std::collections::HashSet;
use thiserror::Error as ThisError;

use crate::schema::{ColumnSchema, TableSchema};
use crate::{Error, Result};

/// Why a row was refused by [`Table::push_row`].
///
/// Decoding drops rejected rows silently; the reason is only kept for
/// reporting.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RowRejection {
    /// Another row already has the same primary key.
    #[error("duplicate primary key")]
    DuplicateKey,
    /// A primary key column is null.
    #[error("null value in key column '{0}'")]
    NullKey(String),
    /// The row does not have one cell per column.
    #[error("expected {expected} cells, found {found}")]
    ColumnCount {
        /// Number of table columns.
        expected: usize,
        /// Number of cells in the row.
        found: usize,
    },
    /// A cell does not match its column's type.
    #[error("value for column '{0}' has the wrong type")]
    TypeMismatch(String),
}

impl RowRejection {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateKey => "duplicate_key",
            Self::NullKey(_) => "null_key",
            Self::ColumnCount { .. } => "column_count",
            Self::TypeMismatch(_) => "type_mismatch",
        }
    }
}

/// A single record, one optional value per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Option<Value>>,
}

impl Row {
    /// Creates a row of `width` null cells.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            cells: vec![None; width],
        }
    }

    /// Returns the value at `index`, `None` when null or out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    /// Sets the cell at `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: Option<Value>) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = value;
        }
    }

    /// Returns all cells in column order.
    #[must_use]
    pub fn cells(&self) -> &[Option<Value>] {
        &self.cells
    }

    /// Returns the number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<Option<Value>>> for Row {
    fn from(cells: Vec<Option<Value>>) -> Self {
        Self { cells }
    }
}

/// A named, typed column set plus its rows.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
    key_columns: Vec<usize>,
    keys: HashSet<Vec<Value>>,
}

impl Table {
    /// Creates an empty table for `schema`.
    ///
    /// Key columns that are not declared are ignored.
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        let key_columns = schema
            .primary_key
            .iter()
            .filter_map(|k| schema.column_index(k))
            .collect();
        Self {
            schema,
            rows: Vec::new(),
            key_columns,
            keys: HashSet::new(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Table definition.
    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Columns in declared order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.schema.columns
    }

    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.column_index(name)
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Creates a row shaped for this table, all cells null.
    #[must_use]
    pub fn new_row(&self) -> Row {
        Row::new(self.schema.columns.len())
    }

    /// Returns the value of `column` in row `row`.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Whether a row with this primary key exists.
    ///
    /// Always `false` for tables without a key.
    #[must_use]
    pub fn contains_key(&self, key: &[Value]) -> bool {
        !self.key_columns.is_empty() && self.keys.contains(key)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns the reason when the row has the wrong shape, a cell of the
    /// wrong type, a null key column or a key already present.
    pub fn push_row(&mut self, row: Row) -> std::result::Result<(), RowRejection> {
        self.try_push(row).map_err(|(reason, _)| reason)
    }

    /// Appends a row, handing it back with the reason when it is refused.
    ///
    /// # Errors
    ///
    /// See [`Table::push_row`].
    pub fn try_push(&mut self, row: Row) -> std::result::Result<(), (RowRejection, Row)> {
        match self.admit(&row) {
            Ok(()) => {
                self.rows.push(row);
                Ok(())
            },
            Err(reason) => Err((reason, row)),
        }
    }

    /// Checks `row` against the schema and claims its key.
    fn admit(&mut self, row: &Row) -> std::result::Result<(), RowRejection> {
        let expected = self.schema.columns.len();
        if row.len() != expected {
            return Err(RowRejection::ColumnCount {
                expected,
                found: row.len(),
            });
        }
        for (column, cell) in self.schema.columns.iter().zip(row.cells()) {
            if cell.as_ref().is_some_and(|v| v.kind() != column.kind) {
                return Err(RowRejection::TypeMismatch(column.name.clone()));
            }
        }

        if !self.key_columns.is_empty() {
            let mut key = Vec::with_capacity(self.key_columns.len());
            for &index in &self.key_columns {
                match row.get(index) {
                    Some(value) => key.push(value.clone()),
                    None => {
                        return Err(RowRejection::NullKey(
                            self.schema.columns[index].name.clone(),
                        ));
                    },
                }
            }
            if !self.keys.insert(key) {
                return Err(RowRejection::DuplicateKey);
            }
        }

        Ok(())
    }

    /// Appends a row built from `(column, value)` pairs; other cells are null.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is unknown or the row is rejected.
    pub fn insert<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut row = self.new_row();
        for (column, value) in values {
            let index = self.column_index(column).ok_or_else(|| {
                Error::InvalidInput(format!("Table {} has no column {column}", self.name()))
            })?;
            row.set(index, Some(value));
        }
        self.push_row(row)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", self.name())))
    }

    /// Appends a column; existing rows get a null cell.
    ///
    /// Returns `false` if a column with that name already exists.
    pub fn add_column(&mut self, column: ColumnSchema) -> bool {
        if self.schema.column(&column.name).is_some() {
            return false;
        }
        self.schema.columns.push(column);
        for row in &mut self.rows {
            row.cells.push(None);
        }
        true
    }

    /// Replaces the parent relations, e.g. after a registry merge.
    pub(crate) fn set_parents(&mut self, schema: &TableSchema) {
        self.schema.parents.clone_from(&schema.parents);
    }

    /// Removes all rows.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn keyed_table() -> Table {
        Table::new(
            TableSchema::new("stops.txt")
                .with_column("stop_id", ColumnType::Text)
                .with_column("stop_lat", ColumnType::Decimal)
                .with_primary_key(["stop_id"]),
        )
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut table = keyed_table();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "stop_id"), Some(&Value::from("S1")));
        assert_eq!(table.value(0, "stop_lat"), None);
        assert_eq!(table.value(0, "missing"), None);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = keyed_table();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();

        let mut row = table.new_row();
        row.set(0, Some(Value::from("S1")));
        assert_eq!(table.push_row(row), Err(RowRejection::DuplicateKey));
        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&[Value::from("S1")]));
    }

    #[test]
    fn test_try_push_returns_refused_row() {
        let mut table = keyed_table();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();

        let mut row = table.new_row();
        row.set(0, Some(Value::from("S1")));
        row.set(1, Some(Value::Decimal(rust_decimal::Decimal::ONE)));
        let (reason, returned) = table.try_push(row.clone()).unwrap_err();

        assert_eq!(reason, RowRejection::DuplicateKey);
        assert_eq!(returned, row);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_null_key_rejected() {
        let mut table = keyed_table();
        let row = table.new_row();
        assert_eq!(
            table.push_row(row),
            Err(RowRejection::NullKey("stop_id".to_string()))
        );
    }

    #[test]
    fn test_type_and_shape_checked() {
        let mut table = keyed_table();
        assert!(matches!(
            table.push_row(Row::new(1)),
            Err(RowRejection::ColumnCount { expected: 2, found: 1 })
        ));

        let err = table.insert([("stop_id", Value::from("S1")), ("stop_lat", Value::from("north"))]);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unkeyed_table_accepts_duplicates() {
        let mut table = Table::new(TableSchema::new("x.txt").with_column("a", ColumnType::Text));
        table.insert([("a", Value::from("1"))]).unwrap();
        table.insert([("a", Value::from("1"))]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.contains_key(&[Value::from("1")]));
    }

    #[test]
    fn test_add_column_pads_rows() {
        let mut table = keyed_table();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();

        assert!(table.add_column(ColumnSchema::new("platform_code", ColumnType::Text)));
        assert!(!table.add_column(ColumnSchema::new("stop_id", ColumnType::Text)));
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.value(0, "platform_code"), None);
    }

    #[test]
    fn test_clear_forgets_keys() {
        let mut table = keyed_table();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();
        table.clear();
        table.insert([("stop_id", Value::from("S1"))]).unwrap();
        assert_eq!(table.len(), 1);
    }
}
