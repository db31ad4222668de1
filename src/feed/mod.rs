//! The feed container.
//!
//! A [`Feed`] owns a [`SchemaRegistry`] and one [`Table`] per registered
//! table. Opening a feed never fails because of a bad location; only hard
//! parse failures, cyclic relations and I/O errors on an existing source are
//! reported.

mod resolver;

pub use resolver::{resolve_import_order, resolve_with_seeds};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

use crate::config::FeedConfig;
use crate::io::{
    CsvOptions, DecodeReport, DroppedRow, FeedSource, FilePattern, create_sink, decode, encode,
    open_source,
};
use crate::schema::{MergeSummary, SCHEMA_DOCUMENT_NAME, SchemaDocument, SchemaRegistry, TableSchema};
use crate::table::{Row, Table};
use crate::{Error, Result};

/// What happened while importing a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Tables in the order they were decoded.
    pub order: Vec<String>,
    /// Per-table decode outcome, in import order.
    pub tables: Vec<(String, DecodeReport)>,
    /// Source entries without a table definition.
    pub skipped: Vec<String>,
    /// Effect of the schema document, if the source carried one.
    pub merged: Option<MergeSummary>,
    /// Rows materialized in seed tables.
    pub seeded_rows: usize,
}

impl ImportReport {
    /// Total rows appended across all tables.
    #[must_use]
    pub fn rows_imported(&self) -> usize {
        self.tables.iter().map(|(_, r)| r.rows_appended).sum()
    }

    /// Total rows dropped on insertion conflicts.
    #[must_use]
    pub fn rows_dropped(&self) -> usize {
        self.tables.iter().map(|(_, r)| r.rows_dropped()).sum()
    }
}

/// What a save wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Data files written with their row counts.
    pub tables: Vec<(String, usize)>,
    /// Whether the schema document was written.
    pub schema_document: bool,
}

/// A set of typed tables backed by a schema registry.
#[derive(Debug, Clone)]
pub struct Feed {
    registry: SchemaRegistry,
    tables: Vec<Table>,
    source_path: Option<PathBuf>,
    options: CsvOptions,
    schema_document: String,
    directory_pattern: Option<FilePattern>,
    report: ImportReport,
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}

impl Feed {
    /// Creates an empty feed over the built-in registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(SchemaRegistry::builtin())
    }

    /// Creates an empty feed over `registry`.
    #[must_use]
    pub fn with_registry(registry: SchemaRegistry) -> Self {
        let tables = registry.tables().cloned().map(Table::new).collect();
        Self {
            registry,
            tables,
            source_path: None,
            options: CsvOptions::default(),
            schema_document: SCHEMA_DOCUMENT_NAME.to_string(),
            directory_pattern: None,
            report: ImportReport::default(),
        }
    }

    /// Creates an empty feed using the codec and naming settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(config: &FeedConfig) -> Result<Self> {
        let mut feed = Self::new();
        feed.options = config.csv_options()?;
        feed.directory_pattern = config.file_pattern()?;
        feed.schema_document.clone_from(&config.schema_document);
        Ok(feed)
    }

    /// Opens a feed from a directory or zip archive with default settings.
    ///
    /// A missing, empty or unreadable location gives an empty feed.
    ///
    /// # Errors
    ///
    /// Returns an error if a file holds a value that cannot be parsed, the
    /// parent relations form a cycle, or an entry of an existing source
    /// cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &FeedConfig::default())
    }

    /// Opens a feed using `config`.
    ///
    /// # Errors
    ///
    /// See [`Feed::open`]; also fails on an invalid configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: &FeedConfig) -> Result<Self> {
        let mut feed = Self::with_config(config)?;
        feed.import(path.as_ref())?;
        Ok(feed)
    }

    /// Resolves the order tables at `path` would be imported in, without
    /// decoding any data.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the parent
    /// relations form a cycle.
    pub fn import_order(path: impl AsRef<Path>, config: &FeedConfig) -> Result<Vec<String>> {
        let mut feed = Self::with_config(config)?;
        let mut source = open_source(path.as_ref(), feed.directory_pattern.as_ref());
        feed.merge_source_schema(source.as_mut());
        let names = source.names().to_vec();
        resolve_import_order(&names, &feed.registry)
    }

    #[instrument(
        name = "gtfsio.feed.import",
        skip_all,
        fields(path = %path.display(), tables = tracing::field::Empty)
    )]
    fn import(&mut self, path: &Path) -> Result<()> {
        let start = Instant::now();
        self.source_path = Some(path.to_path_buf());

        let mut source = open_source(path, self.directory_pattern.as_ref());
        let merged = self.merge_source_schema(source.as_mut());

        let names = source.names().to_vec();
        let order = resolve_import_order(&names, &self.registry)?;
        let skipped = names
            .into_iter()
            .filter(|n| *n != self.schema_document && !self.registry.contains(n))
            .collect();

        self.report = ImportReport {
            order: order.clone(),
            merged,
            skipped,
            ..ImportReport::default()
        };

        let result = self.decode_tables(source.as_mut(), &order);
        drop(source);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::histogram!("feed_import_duration_ms", "status" => status)
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::Span::current().record("tables", order.len());

        result
    }

    fn decode_tables(&mut self, source: &mut dyn FeedSource, order: &[String]) -> Result<()> {
        for name in order {
            let Some(index) = self.table_index(name) else {
                continue;
            };
            let decoded = source
                .open(name)
                .and_then(|reader| decode(reader, &mut self.tables[index], &self.options));
            // Rows decoded before a failure stay, so their seeds do too.
            let refused = decoded.as_ref().map_or(&[][..], |r| r.dropped.as_slice());
            self.report.seeded_rows += self.populate_seeds(index, refused);

            let report = decoded?;
            record_decode_metrics(name, &report);
            tracing::debug!(
                table = %name,
                rows = report.rows_appended,
                dropped = report.rows_dropped(),
                "Decoded table"
            );
            self.report.tables.push((name.clone(), report));
        }
        Ok(())
    }

    /// Copies join values of table `index` into every seed parent it
    /// references, returning the number of rows added.
    ///
    /// Rows the table refused still contribute their join values.
    fn populate_seeds(&mut self, index: usize, refused: &[DroppedRow]) -> usize {
        let child = &self.tables[index];
        let mut pending: Vec<(usize, Row)> = Vec::new();

        for relation in &child.schema().parents {
            if !self.registry.get(&relation.parent).is_some_and(|s| s.seed) {
                continue;
            }
            let Some(seed_index) = self.table_index(&relation.parent) else {
                continue;
            };
            let seed = &self.tables[seed_index];
            let bindings: Option<Vec<(usize, usize)>> = relation
                .columns
                .iter()
                .map(|(from, to)| Some((child.column_index(from)?, seed.column_index(to)?)))
                .collect();
            let Some(bindings) = bindings.filter(|b| !b.is_empty()) else {
                continue;
            };

            for row in child.rows().iter().chain(refused.iter().map(|d| &d.row)) {
                let mut seed_row = seed.new_row();
                let mut complete = true;
                for &(from, to) in &bindings {
                    match row.get(from) {
                        Some(value) if value.kind() == seed.columns()[to].kind => {
                            seed_row.set(to, Some(value.clone()));
                        },
                        _ => complete = false,
                    }
                }
                if complete {
                    pending.push((seed_index, seed_row));
                }
            }
        }

        pending
            .into_iter()
            .map(|(seed_index, row)| self.tables[seed_index].push_row(row))
            .filter(std::result::Result::is_ok)
            .count()
    }

    /// Reads and merges the schema document if `source` has one.
    fn merge_source_schema(&mut self, source: &mut dyn FeedSource) -> Option<MergeSummary> {
        if !source.contains(&self.schema_document) {
            return None;
        }
        let document =
            source
                .open(&self.schema_document)
                .and_then(SchemaDocument::from_reader);
        match document {
            Ok(document) => {
                let summary = self.merge_schema(&document);
                tracing::debug!(
                    tables_added = summary.tables_added,
                    columns_added = summary.columns_added,
                    "Merged schema document"
                );
                Some(summary)
            },
            Err(e) => {
                tracing::warn!(
                    document = %self.schema_document,
                    error = %e,
                    "Ignoring unreadable schema document"
                );
                None
            },
        }
    }

    /// Merges a schema document into the registry and reshapes the tables.
    ///
    /// New tables start empty; existing tables gain the new columns with
    /// null cells for rows already present.
    pub fn merge_schema(&mut self, document: &SchemaDocument) -> MergeSummary {
        let summary = self.registry.merge(document);
        self.sync_tables();
        summary
    }

    fn sync_tables(&mut self) {
        for schema in self.registry.tables() {
            match self.tables.iter_mut().find(|t| t.name() == schema.name) {
                Some(table) => {
                    for column in &schema.columns {
                        table.add_column(column.clone());
                    }
                    table.set_parents(schema);
                },
                None => self.tables.push(Table::new(schema.clone())),
            }
        }
    }

    /// Registers a custom table and returns its (empty) data table.
    ///
    /// # Errors
    ///
    /// Returns an error if a table with that name exists or the definition
    /// is inconsistent.
    pub fn add_table(&mut self, schema: TableSchema) -> Result<&mut Table> {
        let name = schema.name.clone();
        self.registry.insert(schema)?;
        let schema = self
            .registry
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("Table not registered: {name}")))?;
        self.tables.push(Table::new(schema));
        let index = self.tables.len() - 1;
        Ok(&mut self.tables[index])
    }

    /// Writes the feed to a directory or, for a `.zip` path, an archive.
    ///
    /// Tables with rows that are not excluded from data export become one
    /// file each. When the registry holds custom tables, the schema document
    /// is written as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be written; whatever was
    /// written before the failure stays.
    #[instrument(name = "gtfsio.feed.save", skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<SaveReport> {
        let mut sink = create_sink(path.as_ref())?;
        let mut report = SaveReport::default();

        for table in self.exportable_tables() {
            let encoded = {
                let mut writer = sink.entry(table.name())?;
                encode(table, &mut writer, &self.options)?
            };
            metrics::counter!("feed_rows_exported_total", "table" => table.name().to_string())
                .increment(encoded.rows_written as u64);
            tracing::debug!(table = %table.name(), rows = encoded.rows_written, "Encoded table");
            report.tables.push((table.name().to_string(), encoded.rows_written));
        }

        if self.registry.has_custom_tables() {
            let mut writer = sink.entry(&self.schema_document)?;
            self.registry.to_document().to_writer(&mut writer)?;
            writer
                .flush()
                .map_err(|e| Error::failed("write_schema_document", e))?;
            report.schema_document = true;
        }

        sink.finish()?;
        Ok(report)
    }

    fn exportable_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| {
            !t.is_empty()
                && self
                    .registry
                    .get(t.name())
                    .is_some_and(|s| !s.exclude_from_data_export)
        })
    }

    fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name() == name)
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Looks up a table for mutation.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    /// All tables, in registry order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// The schema registry.
    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Location the feed was opened from.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Outcome of the last import.
    #[must_use]
    pub const fn import_report(&self) -> &ImportReport {
        &self.report
    }

    /// Codec options used for import and export.
    #[must_use]
    pub const fn options(&self) -> &CsvOptions {
        &self.options
    }
}

fn record_decode_metrics(table: &str, report: &DecodeReport) {
    metrics::counter!("feed_rows_imported_total", "table" => table.to_string())
        .increment(report.rows_appended as u64);
    for dropped in &report.dropped {
        metrics::counter!(
            "feed_rows_dropped_total",
            "table" => table.to_string(),
            "reason" => dropped.reason.as_str()
        )
        .increment(1);
    }
    if report.nulled_durations > 0 {
        metrics::counter!("feed_durations_nulled_total", "table" => table.to_string())
            .increment(report.nulled_durations as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, ParentRelation, SERVICES_TABLE};
    use crate::table::Value;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_new_feed_has_builtin_tables() {
        let feed = Feed::new();
        assert!(feed.table("agency.txt").is_some());
        assert!(feed.table(SERVICES_TABLE).is_some());
        assert!(feed.tables().iter().all(Table::is_empty));
        assert!(feed.source_path().is_none());
    }

    #[test]
    fn test_open_missing_path_is_empty() {
        let feed = Feed::open("definitely/not/here").unwrap();
        assert_eq!(feed.tables().len(), SchemaRegistry::builtin().len());
        assert!(feed.import_report().order.is_empty());
        assert_eq!(feed.source_path(), Some(Path::new("definitely/not/here")));
    }

    #[test]
    fn test_seed_rows_populated_from_children() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "calendar_dates.txt",
            "service_id,date,exception_type\nWK,20240101,1\nWK,20240102,1\nSA,20240106,1\n",
        );
        write(dir.path(), "trips.txt", "route_id,service_id,trip_id\nR1,SU,T1\n");

        let feed = Feed::open(dir.path()).unwrap();
        let services = feed.table(SERVICES_TABLE).unwrap();
        let ids: Vec<_> = (0..services.len())
            .filter_map(|i| services.value(i, "service_id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, ["WK", "SA", "SU"]);
        assert_eq!(feed.import_report().seeded_rows, 3);
        assert_eq!(feed.import_report().order, ["calendar_dates.txt", "trips.txt"]);
    }

    #[test]
    fn test_refused_rows_still_seed_services() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "trips.txt",
            "route_id,service_id,trip_id\nR1,WK,T1\nR1,SU,T1\n",
        );

        let feed = Feed::open(dir.path()).unwrap();
        assert_eq!(feed.table("trips.txt").unwrap().len(), 1);
        assert_eq!(feed.import_report().rows_dropped(), 1);

        let services = feed.table(SERVICES_TABLE).unwrap();
        let ids: Vec<_> = (0..services.len())
            .filter_map(|i| services.value(i, "service_id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, ["WK", "SU"]);
        assert_eq!(feed.import_report().seeded_rows, 2);
    }

    #[test]
    fn test_parse_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "feed_info.txt", "feed_publisher_name,feed_start_date\nX,2024-01-01\n");

        let err = Feed::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { ref column, .. } if column == "feed_start_date"));
    }

    #[test]
    fn test_add_table_rejects_duplicates() {
        let mut feed = Feed::new();
        let table = feed
            .add_table(TableSchema::new("extra.csv").with_column("id", ColumnType::Integer))
            .unwrap();
        table.insert([("id", Value::Integer(1))]).unwrap();

        assert!(feed.add_table(TableSchema::new("extra.csv")).is_err());
        assert!(feed.add_table(TableSchema::new("stops.txt")).is_err());
        assert_eq!(feed.table("extra.csv").unwrap().len(), 1);
        assert!(feed.registry().has_custom_tables());
    }

    #[test]
    fn test_merge_schema_extends_existing_table() {
        let mut feed = Feed::new();
        feed.table_mut("agency.txt")
            .unwrap()
            .insert([("agency_id", Value::from("A"))])
            .unwrap();

        let document = SchemaDocument::new(vec![
            TableSchema::new("agency.txt").with_column("agency_brand", ColumnType::Text),
            TableSchema::new("notes.txt")
                .with_column("agency_id", ColumnType::Text)
                .with_parent(ParentRelation::new("agency.txt", [("agency_id", "agency_id")])),
        ]);
        let summary = feed.merge_schema(&document);

        assert_eq!(summary.tables_added, 1);
        assert_eq!(summary.columns_added, 1);
        let agency = feed.table("agency.txt").unwrap();
        assert!(agency.column_index("agency_brand").is_some());
        assert!(agency.value(0, "agency_brand").is_none());
        assert_eq!(
            feed.table("notes.txt").unwrap().schema().parents[0].parent,
            "agency.txt"
        );
    }

    #[test]
    fn test_import_order_without_decoding() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stop_times.txt", "trip_id\nT1\n");
        write(dir.path(), "trips.txt", "trip_id\nT1\n");
        write(dir.path(), "stops.txt", "stop_id\nS1\n");

        let order = Feed::import_order(dir.path(), &FeedConfig::default()).unwrap();
        assert_eq!(order, ["stops.txt", "trips.txt", "stop_times.txt"]);
    }

    #[test]
    fn test_save_skips_empty_and_excluded_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut feed = Feed::new();
        feed.table_mut(SERVICES_TABLE)
            .unwrap()
            .insert([("service_id", Value::from("WK"))])
            .unwrap();
        feed.table_mut("stops.txt")
            .unwrap()
            .insert([("stop_id", Value::from("S1"))])
            .unwrap();

        let report = feed.save(dir.path().join("out")).unwrap();
        assert_eq!(report.tables, [("stops.txt".to_string(), 1)]);
        assert!(!report.schema_document);
        assert!(!dir.path().join("out").join(SERVICES_TABLE).exists());
    }
}
