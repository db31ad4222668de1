//! Source adapters.
//!
//! Maps a directory or a zip archive to named byte streams. Opening never
//! fails: an empty, missing or unreadable location yields an
//! [`EmptySource`] so a feed can always be constructed.

use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::traits::FeedSource;
use crate::{Error, Result};

/// Glob-style file name filter supporting `*` and `?`.
#[derive(Debug, Clone)]
pub struct FilePattern {
    glob: String,
    regex: Regex,
}

impl FilePattern {
    /// Compiles a glob such as `*.txt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern cannot be compiled.
    pub fn new(glob: &str) -> Result<Self> {
        let mut expr = String::with_capacity(glob.len() + 2);
        expr.push('^');
        let mut buf = [0u8; 4];
        for c in glob.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| Error::InvalidInput(format!("Invalid file pattern {glob:?}: {e}")))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    /// Whether a file name matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The original glob.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

/// Whether a path names a zip archive, judged by its extension.
#[must_use]
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Opens whatever `path` points at.
///
/// An existing `.zip` file is read as an archive, an existing directory as a
/// directory (optionally filtered by `pattern`). Anything else, including
/// failures to read an archive or list a directory, gives an empty source.
#[must_use]
pub fn open_source(path: &Path, pattern: Option<&FilePattern>) -> Box<dyn FeedSource> {
    if path.as_os_str().is_empty() {
        return Box::new(EmptySource::new());
    }
    if path.is_file() && is_archive_path(path) {
        match ArchiveSource::open(path) {
            Ok(source) => return Box::new(source),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable archive, using empty feed");
            },
        }
    } else if path.is_dir() {
        match DirectorySource::open(path, pattern) {
            Ok(source) => return Box::new(source),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable directory, using empty feed");
            },
        }
    } else {
        tracing::debug!(path = %path.display(), "No feed at path, using empty feed");
    }
    Box::new(EmptySource::new())
}

/// A source with no entries.
#[derive(Debug, Default)]
pub struct EmptySource {
    names: Vec<String>,
}

impl EmptySource {
    /// Creates an empty source.
    #[must_use]
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }
}

impl FeedSource for EmptySource {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        Err(Error::InvalidInput(format!("No entry named {name}")))
    }
}

/// Regular files of a directory, sorted by name.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    names: Vec<String>,
}

impl DirectorySource {
    /// Lists the files directly inside `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn open(root: &Path, pattern: Option<&FilePattern>) -> Result<Self> {
        let entries = std::fs::read_dir(root).map_err(|e| Error::failed("read_feed_directory", e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::failed("read_feed_directory", e))?;
            if !entry.path().is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if pattern.is_none_or(|p| p.matches(&name)) {
                names.push(name);
            }
        }
        names.sort();

        Ok(Self {
            root: root.to_path_buf(),
            names,
        })
    }
}

impl FeedSource for DirectorySource {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        if !self.contains(name) {
            return Err(Error::InvalidInput(format!("No entry named {name}")));
        }
        let file = File::open(self.root.join(name)).map_err(|e| Error::OperationFailed {
            operation: "open_feed_file".to_string(),
            cause: format!("{name}: {e}"),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Entries of a zip archive, keyed by file name without directories.
pub struct ArchiveSource {
    archive: zip::ZipArchive<BufReader<File>>,
    names: Vec<String>,
    indices: Vec<usize>,
}

impl ArchiveSource {
    /// Opens an archive for reading.
    ///
    /// Directory entries are skipped; when two entries share a file name the
    /// first one wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a zip archive.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::failed("open_feed_archive", e))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| Error::failed("read_feed_archive", e))?;

        let mut names = Vec::new();
        let mut indices = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| Error::failed("read_feed_archive", e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().rsplit('/').next().unwrap_or_default().to_string();
            if name.is_empty() || names.contains(&name) {
                continue;
            }
            names.push(name);
            indices.push(index);
        }

        Ok(Self {
            archive,
            names,
            indices,
        })
    }
}

impl FeedSource for ArchiveSource {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        let position = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::InvalidInput(format!("No entry named {name}")))?;
        let entry = self
            .archive
            .by_index(self.indices[position])
            .map_err(|e| Error::OperationFailed {
                operation: "open_archive_entry".to_string(),
                cause: format!("{name}: {e}"),
            })?;
        Ok(Box::new(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn read_all(source: &mut dyn FeedSource, name: &str) -> String {
        let mut content = String::new();
        source.open(name).unwrap().read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_file_pattern() {
        let pattern = FilePattern::new("*.txt").unwrap();
        assert!(pattern.matches("stops.txt"));
        assert!(!pattern.matches("stops.csv"));
        assert!(!pattern.matches("stops.txt.bak"));

        let pattern = FilePattern::new("test?.c+v").unwrap();
        assert!(pattern.matches("test1.c+v"));
        assert!(!pattern.matches("test1.ccv"));
        assert_eq!(pattern.as_str(), "test?.c+v");
    }

    #[test]
    fn test_archive_path_detection() {
        assert!(is_archive_path(Path::new("feed.zip")));
        assert!(is_archive_path(Path::new("FEED.ZIP")));
        assert!(!is_archive_path(Path::new("feed")));
        assert!(!is_archive_path(Path::new("feed.zip.txt")));
    }

    #[test]
    fn test_directory_source_lists_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stops.txt"), "stop_id\n1\n").unwrap();
        std::fs::write(dir.path().join("agency.txt"), "agency_id\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut source = DirectorySource::open(dir.path(), None).unwrap();
        assert_eq!(source.names(), ["agency.txt", "notes.md", "stops.txt"]);
        assert_eq!(read_all(&mut source, "stops.txt"), "stop_id\n1\n");
        assert!(source.open("nested").is_err());

        let pattern = FilePattern::new("*.txt").unwrap();
        let source = DirectorySource::open(dir.path(), Some(&pattern)).unwrap();
        assert_eq!(source.names(), ["agency.txt", "stops.txt"]);
    }

    #[test]
    fn test_archive_source_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
            let options = SimpleFileOptions::default();
            writer.add_directory("gtfs/", options).unwrap();
            writer.start_file("gtfs/trips.txt", options).unwrap();
            writer.write_all(b"trip_id\nT1\n").unwrap();
            writer.start_file("agency.txt", options).unwrap();
            writer.write_all(b"agency_id\n1\n").unwrap();
            writer.finish().unwrap();
        }

        let mut source = ArchiveSource::open(&path).unwrap();
        assert_eq!(source.names(), ["trips.txt", "agency.txt"]);
        assert_eq!(read_all(&mut source, "trips.txt"), "trip_id\nT1\n");
        assert_eq!(read_all(&mut source, "agency.txt"), "agency_id\n1\n");
        assert!(source.open("missing.txt").is_err());
    }

    #[test]
    fn test_open_source_is_lenient() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.zip");
        std::fs::write(&bogus, "not a zip").unwrap();
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "x").unwrap();

        for path in [
            PathBuf::new(),
            PathBuf::from("bla bla 1-2/3?4"),
            dir.path().join("missing"),
            bogus,
            plain,
        ] {
            assert!(open_source(&path, None).names().is_empty(), "{}", path.display());
        }
        assert!(open_source(dir.path(), None).contains("plain.txt"));
    }
}
