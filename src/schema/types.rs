//! Column, relation and table definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Semantic type of a column.
///
/// Drives both decoding and encoding of cell values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 0/1 flag.
    #[serde(alias = "bool")]
    Boolean,
    /// Calendar day written as `YYYYMMDD`.
    #[serde(alias = "datetime")]
    Date,
    /// Fixed-point number (prices, coordinates).
    #[serde(alias = "double")]
    Decimal,
    /// Base-10 integer.
    #[serde(alias = "int", alias = "int32")]
    Integer,
    /// Time of day that may exceed 24 hours, `H+:MM:SS`.
    #[serde(alias = "timespan")]
    Duration,
    /// Free text.
    #[default]
    #[serde(alias = "string")]
    Text,
}

impl ColumnType {
    /// Returns all column types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Boolean,
            Self::Date,
            Self::Decimal,
            Self::Integer,
            Self::Duration,
            Self::Text,
        ]
    }

    /// Returns the string representation used in schema documents.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::Duration => "duration",
            Self::Text => "text",
        }
    }

    /// Parses a type name, accepting the common aliases.
    ///
    /// Returns `None` if the name is not recognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "date" | "datetime" => Some(Self::Date),
            "decimal" | "double" => Some(Self::Decimal),
            "integer" | "int" | "int32" => Some(Self::Integer),
            "duration" | "timespan" => Some(Self::Duration),
            "text" | "string" => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether encoded values of this type are quote-enclosed when they
    /// contain the delimiter or a quote.
    #[must_use]
    pub const fn is_quotable(&self) -> bool {
        matches!(self, Self::Integer | Self::Text)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("Unknown column type: {s}")))
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name as it appears in file headers.
    pub name: String,
    /// Semantic type. Defaults to text when omitted from a schema document.
    #[serde(rename = "type", default)]
    pub kind: ColumnType,
}

impl ColumnSchema {
    /// Creates a column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Directed dependency from a child table to a parent table.
///
/// Used only to order imports; never enforced while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRelation {
    /// Name of the parent table.
    pub parent: String,
    /// Join columns as `(child column, parent column)` pairs.
    #[serde(default)]
    pub columns: Vec<(String, String)>,
}

impl ParentRelation {
    /// Creates a relation to `parent` joined on the given column pairs.
    #[must_use]
    pub fn new<I, C, P>(parent: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        Self {
            parent: parent.into(),
            columns: columns
                .into_iter()
                .map(|(child, parent)| (child.into(), parent.into()))
                .collect(),
        }
    }
}

/// Structure and export flags of a single table.
///
/// Serializes to the structural subset found in schema documents: flags that
/// only make sense for the running registry are never written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name, identical to its file name (`stops.txt`).
    pub name: String,
    /// Columns in declared order.
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    /// Columns forming the primary key. Empty means no key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Parent relations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentRelation>,
    /// Never written as a data file.
    #[serde(default, skip_serializing)]
    pub exclude_from_data_export: bool,
    /// Never written into an emitted schema document.
    #[serde(default, skip_serializing)]
    pub exclude_from_schema_export: bool,
    /// Synthetic table scheduled ahead of everything else during import and
    /// populated from its children's join columns.
    #[serde(default, skip_serializing)]
    pub seed: bool,
    /// Part of the registry's base state.
    #[serde(skip)]
    pub built_in: bool,
}

impl TableSchema {
    /// Creates an empty custom table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            parents: Vec::new(),
            exclude_from_data_export: false,
            exclude_from_schema_export: false,
            seed: false,
            built_in: false,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, kind: ColumnType) -> Self {
        self.columns.push(ColumnSchema::new(name, kind));
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a parent relation.
    #[must_use]
    pub fn with_parent(mut self, relation: ParentRelation) -> Self {
        self.parents.push(relation);
        self
    }

    /// Marks the table as excluded from data export.
    #[must_use]
    pub const fn excluded_from_data_export(mut self) -> Self {
        self.exclude_from_data_export = true;
        self
    }

    /// Marks the table as excluded from schema export.
    #[must_use]
    pub const fn excluded_from_schema_export(mut self) -> Self {
        self.exclude_from_schema_export = true;
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns the names of all parent tables.
    pub fn parent_names(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(|r| r.parent.as_str())
    }
}
