//! Destination adapters for saving feeds.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

use super::source::is_archive_path;
use super::traits::FeedSink;
use crate::{Error, Result};

/// Creates a sink for `path`: a zip archive when it ends in `.zip`, a
/// directory otherwise.
///
/// # Errors
///
/// Returns an error if the archive or directory cannot be created.
pub fn create_sink(path: &Path) -> Result<Box<dyn FeedSink>> {
    if is_archive_path(path) {
        Ok(Box::new(ArchiveSink::create(path)?))
    } else {
        Ok(Box::new(DirectorySink::create(path)?))
    }
}

/// Rejects names that would escape the destination.
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!("Invalid entry name: {name:?}")));
    }
    Ok(())
}

/// Writes one file per entry into a directory.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Creates the directory (and parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| Error::OperationFailed {
            operation: "create_feed_directory".to_string(),
            cause: format!("{}: {e}", root.display()),
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl FeedSink for DirectorySink {
    fn entry(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        validate_entry_name(name)?;
        let file = File::create(self.root.join(name)).map_err(|e| Error::OperationFailed {
            operation: "create_feed_file".to_string(),
            cause: format!("{name}: {e}"),
        })?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Writes entries into a new zip archive, replacing any existing file.
pub struct ArchiveSink {
    writer: zip::ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
}

impl ArchiveSink {
    /// Creates or truncates the archive file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::failed("create_archive_dir", e))?;
        }
        let file = File::create(path).map_err(|e| Error::OperationFailed {
            operation: "create_feed_archive".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(Self {
            writer: zip::ZipWriter::new(BufWriter::new(file)),
            options: SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated),
        })
    }
}

impl FeedSink for ArchiveSink {
    fn entry(&mut self, name: &str) -> Result<Box<dyn Write + '_>> {
        validate_entry_name(name)?;
        self.writer
            .start_file(name, self.options)
            .map_err(|e| Error::OperationFailed {
                operation: "create_archive_entry".to_string(),
                cause: format!("{name}: {e}"),
            })?;
        Ok(Box::new(&mut self.writer))
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let sink = *self;
        let mut file = sink
            .writer
            .finish()
            .map_err(|e| Error::failed("finish_feed_archive", e))?;
        file.flush().map_err(|e| Error::failed("finish_feed_archive", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::{ArchiveSource, DirectorySource};
    use crate::io::traits::FeedSource;
    use std::io::Read;

    fn write_entry(sink: &mut dyn FeedSink, name: &str, content: &str) {
        let mut writer = sink.entry(name).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.flush().unwrap();
    }

    #[test]
    fn test_directory_sink_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");

        let mut sink = create_sink(&target).unwrap();
        write_entry(sink.as_mut(), "agency.txt", "agency_id\n1\n");
        sink.finish().unwrap();

        let source = DirectorySource::open(&target, None).unwrap();
        assert_eq!(source.names(), ["agency.txt"]);
    }

    #[test]
    fn test_archive_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let mut sink = create_sink(&path).unwrap();
        write_entry(sink.as_mut(), "stops.txt", "stop_id\nS1\n");
        sink.finish().unwrap();

        let mut source = ArchiveSource::open(&path).unwrap();
        let mut content = String::new();
        source
            .open("stops.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "stop_id\nS1\n");
    }

    #[test]
    fn test_entry_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path()).unwrap();
        for name in ["", "..", "../x.txt", "a/b.txt", "a\\b.txt"] {
            assert!(sink.entry(name).is_err(), "{name}");
        }
    }
}
