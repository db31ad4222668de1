//! Configuration management.
//!
//! Settings come from defaults, then an optional TOML file, then `GTFSIO_*`
//! environment variables, each layer overriding the previous one.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::io::{CsvOptions, FilePattern};
use crate::observability::LogFormat;
use crate::schema::SCHEMA_DOCUMENT_NAME;
use crate::{Error, Result};

/// Main configuration for gtfsio.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Field delimiter used for every table.
    pub delimiter: char,
    /// File name of the schema document read on import and written on export.
    pub schema_document: String,
    /// Glob restricting which files of a directory source are considered.
    pub directory_pattern: Option<String>,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Logging section.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter directive when neither `GTFSIO_LOG` nor `RUST_LOG` is set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; standard error otherwise.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Delimiter, a one-character string.
    pub delimiter: Option<String>,
    /// Schema document name.
    pub schema_document: Option<String>,
    /// Directory glob.
    pub directory_pattern: Option<String>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Filter directive, e.g. `debug` or `gtfsio=trace`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            schema_document: SCHEMA_DOCUMENT_NAME.to_string(),
            directory_pattern: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl FeedConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::failed("parse_config_file", e))?;
        let config = Self::from_config_file(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Looks for `gtfsio/config.toml` in the platform config directory and
    /// returns defaults when there is none or it cannot be loaded.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs.config_dir().join("gtfsio").join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                },
            }
        }

        Self::default()
    }

    /// Applies `GTFSIO_*` environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(delimiter) = lookup("GTFSIO_DELIMITER") {
            self.delimiter = CsvOptions::from_delimiter_str(&delimiter)?.delimiter();
        }
        if let Some(name) = lookup("GTFSIO_SCHEMA_DOCUMENT") {
            self.schema_document = name;
        }
        if let Some(pattern) = lookup("GTFSIO_DIRECTORY_PATTERN") {
            self.directory_pattern = Some(pattern).filter(|p| !p.is_empty());
        }
        if let Some(format) = lookup("GTFSIO_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(file) = lookup("GTFSIO_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file)).filter(|p| !p.as_os_str().is_empty());
        }
        self.validate()?;
        Ok(self)
    }

    /// Converts a `ConfigFile` to `FeedConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(delimiter) = file.delimiter {
            config.delimiter = CsvOptions::from_delimiter_str(&delimiter)?.delimiter();
        }
        if let Some(name) = file.schema_document {
            config.schema_document = name;
        }
        config.directory_pattern = file.directory_pattern;
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = format.parse()?;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.csv_options()?;
        self.file_pattern()?;
        if self.schema_document.is_empty() || self.schema_document.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "Invalid schema document name: {:?}",
                self.schema_document
            )));
        }
        Ok(())
    }

    /// Sets the delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the directory pattern.
    #[must_use]
    pub fn with_directory_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.directory_pattern = Some(pattern.into());
        self
    }

    /// Codec options derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the delimiter is not supported.
    pub fn csv_options(&self) -> Result<CsvOptions> {
        CsvOptions::new(self.delimiter)
    }

    /// Compiled directory pattern, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern cannot be compiled.
    pub fn file_pattern(&self) -> Result<Option<FilePattern>> {
        self.directory_pattern
            .as_deref()
            .map(FilePattern::new)
            .transpose()
    }
}
