//! Feed I/O subsystem.
//!
//! # Architecture
//!
//! - **Sources** implement [`FeedSource`]: a directory or zip archive seen as
//!   named byte streams
//! - **Sinks** implement [`FeedSink`]: a directory or zip archive to write
//!   entries into
//! - **Codec** converts between delimited text and typed table rows
//!
//! # Supported Containers
//!
//! | Container | Read | Write | Notes |
//! |-----------|------|-------|-------|
//! | Directory | ✓ | ✓ | Optional `*`/`?` file name filter on read |
//! | Zip | ✓ | ✓ | Entry names lose their directory part on read |

pub mod codec;
pub mod sink;
pub mod source;
pub mod traits;

pub use codec::{CsvOptions, DecodeReport, DroppedRow, EncodeReport, decode, encode};
pub use sink::{ArchiveSink, DirectorySink, create_sink};
pub use source::{ArchiveSource, DirectorySource, EmptySource, FilePattern, is_archive_path, open_source};
pub use traits::{FeedSink, FeedSource};
