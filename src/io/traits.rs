//! Core traits for reading and writing feed entries.
//!
//! Defines the [`FeedSource`] and [`FeedSink`] traits that the directory and
//! archive adapters implement.

use crate::Result;
use std::io::{Read, Write};

/// A set of named byte streams, e.g. the files of a directory or the entries
/// of a zip archive.
///
/// # Lifecycle
///
/// 1. Enumerate entries with [`FeedSource::names`]
/// 2. Open each entry with [`FeedSource::open`]; the returned reader borrows
///    the source, so at most one entry is open at a time
/// 3. Drop the source to release every underlying handle
pub trait FeedSource {
    /// Entry names in enumeration order.
    fn names(&self) -> &[String];

    /// Opens an entry for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry does not exist or cannot be opened.
    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>>;

    /// Whether an entry with this name exists.
    fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// Destination for feed entries.
///
/// # Lifecycle
///
/// 1. Call [`FeedSink::entry`] for each file and write it fully, flushing
///    before the writer is dropped
/// 2. Call [`FeedSink::finish`] to complete the destination
pub trait FeedSink {
    /// Starts a new entry and returns a writer for its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be created.
    fn entry(&mut self, name: &str) -> Result<Box<dyn Write + '_>>;

    /// Finalizes the destination, writing any trailers.
    ///
    /// This method consumes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn finish(self: Box<Self>) -> Result<()>;
}
