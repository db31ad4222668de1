//! # gtfsio
//!
//! Import and export of multi-table delimited-text feeds (GTFS and friends).
//!
//! A feed is a set of named tables stored as delimited text files, either loose
//! inside a directory or packed inside a zip archive. Tables reference each
//! other through declared parent relations, and the set of known tables can be
//! extended at runtime by a schema document shipped alongside the data.
//!
//! ## Features
//!
//! - Dependency-ordered import (parents before children)
//! - Typed RFC4180-style codec with byte-exact encoding rules
//! - Schema merge from `gtfs.schema.json` for custom tables
//! - Filtered export to a directory or zip archive
//!
//! ## Example
//!
//! ```rust,no_run
//! use gtfsio::Feed;
//!
//! let feed = Feed::open("feeds/sample.zip")?;
//! if let Some(agency) = feed.table("agency.txt") {
//!     println!("{} agencies", agency.len());
//! }
//! feed.save("out/sample")?;
//! # Ok::<(), gtfsio::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod feed;
pub mod io;
pub mod observability;
pub mod schema;
pub mod table;

pub use config::FeedConfig;
pub use feed::{Feed, ImportReport, SaveReport, resolve_import_order};
pub use io::{CsvOptions, DecodeReport, EncodeReport};
pub use schema::{ColumnSchema, ColumnType, ParentRelation, SchemaDocument, SchemaRegistry, TableSchema};
pub use table::{Duration, Row, RowRejection, Table, Value};

/// Error type for feed operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad delimiter, malformed config, wrong value type for a column |
/// | `OperationFailed` | I/O, zip, csv or serialization failures |
/// | `Parse` | A non-duration cell cannot be converted to its column type |
/// | `CyclicDependency` | Parent relations among the candidate tables form a cycle |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - A zip archive cannot be written
    /// - A schema document or config file cannot be (de)serialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A field could not be converted to its column's type.
    ///
    /// Aborts the decode of the file it occurred in. Rows appended before the
    /// failing line stay in the table.
    #[error("table '{table}' line {line}: cannot parse {value:?} in column '{column}' as {expected}")]
    Parse {
        /// Table being decoded.
        table: String,
        /// 1-based line number in the source file.
        line: u64,
        /// Column the value belongs to.
        column: String,
        /// Offending raw value.
        value: String,
        /// Expected semantic type.
        expected: schema::ColumnType,
    },

    /// The import order cannot be resolved.
    #[error("cyclic dependency among tables: {}", tables.join(", "))]
    CyclicDependency {
        /// Tables that could not be scheduled.
        tables: Vec<String>,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub(crate) fn failed(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::failed("open_feed", "denied");
        assert_eq!(err.to_string(), "operation 'open_feed' failed: denied");

        let err = Error::CyclicDependency {
            tables: vec!["a.txt".to_string(), "b.txt".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency among tables: a.txt, b.txt");
    }

    #[test]
    fn test_parse_error_display() {
        let err = Error::Parse {
            table: "calendar.txt".to_string(),
            line: 3,
            column: "start_date".to_string(),
            value: "2024-01-01".to_string(),
            expected: schema::ColumnType::Date,
        };
        let display = err.to_string();
        assert!(display.contains("calendar.txt"));
        assert!(display.contains("line 3"));
        assert!(display.contains("\"2024-01-01\""));
        assert!(display.contains("date"));
    }
}
