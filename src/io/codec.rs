//! Delimited-text codec.
//!
//! Converts between RFC4180-style text (header line, optional `"` enclosure
//! with doubled-quote escaping) and typed [`Table`] rows.
//!
//! Decoding is strict for every type except durations: a malformed boolean,
//! date, decimal or integer aborts the file, while a malformed duration
//! silently becomes null. Rows refused by the table (duplicate or null key)
//! are dropped without error and only show up in the [`DecodeReport`].

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::{Read, Write};

use crate::schema::ColumnType;
use crate::table::{Duration, Row, RowRejection, Table, Value};
use crate::{Error, Result};

/// Fractional digits kept when writing decimals.
const DECIMAL_PLACES: u32 = 6;

/// Dialect shared by decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvOptions {
    /// Creates options with the given field delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error unless the delimiter is a single ASCII character other
    /// than a quote or a line break.
    pub fn new(delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\r' | '\n') {
            return Err(Error::InvalidInput(format!(
                "Unsupported delimiter: {delimiter:?}"
            )));
        }
        let mut buf = [0u8; 1];
        delimiter.encode_utf8(&mut buf);
        Ok(Self { delimiter: buf[0] })
    }

    /// Parses a delimiter given as a string, e.g. from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not exactly one supported character.
    pub fn from_delimiter_str(delimiter: &str) -> Result<Self> {
        let mut chars = delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(Error::InvalidInput(format!(
                "Delimiter must be a single character: {delimiter:?}"
            ))),
        }
    }

    /// Field delimiter.
    #[must_use]
    pub const fn delimiter(&self) -> char {
        self.delimiter as char
    }

    fn terminator() -> csv::Terminator {
        if cfg!(windows) {
            csv::Terminator::CRLF
        } else {
            csv::Terminator::Any(b'\n')
        }
    }
}

/// A row that was read but not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    /// 1-based line number in the source.
    pub line: u64,
    /// Why the table refused it.
    pub reason: RowRejection,
    /// The decoded cells.
    pub row: Row,
}

/// Outcome of decoding one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Data lines read.
    pub rows_read: usize,
    /// Rows appended to the table.
    pub rows_appended: usize,
    /// Rows refused by the table.
    pub dropped: Vec<DroppedRow>,
    /// Duration cells that failed to parse and were left null.
    pub nulled_durations: usize,
    /// Header fields with no matching column.
    pub ignored_fields: Vec<String>,
}

impl DecodeReport {
    /// Number of rows silently dropped.
    #[must_use]
    pub fn rows_dropped(&self) -> usize {
        self.dropped.len()
    }
}

/// Outcome of encoding one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeReport {
    /// Data lines written (header excluded).
    pub rows_written: usize,
}

/// Parsed form of a single non-empty field.
enum Cell {
    Set(Value),
    Nulled,
}

/// Reads delimited text into `table`.
///
/// The first line names the fields. Fields without a matching column are
/// ignored and columns missing from the header stay null. The reader is
/// consumed and dropped on every exit path.
///
/// # Errors
///
/// Returns [`Error::Parse`] on the first non-duration field that does not
/// convert to its column type. Rows appended before that line remain in the
/// table. I/O and malformed-CSV errors are reported as
/// [`Error::OperationFailed`].
pub fn decode<R: Read>(reader: R, table: &mut Table, options: &CsvOptions) -> Result<DecodeReport> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| Error::failed("read_csv_headers", e))?
        .clone();

    let mut report = DecodeReport::default();
    let bindings: Vec<Option<(usize, ColumnType)>> = headers
        .iter()
        .map(|header| {
            let name = header.trim_start_matches('\u{feff}').trim();
            let binding = table
                .column_index(name)
                .map(|index| (index, table.columns()[index].kind));
            if binding.is_none() {
                report.ignored_fields.push(name.to_string());
            }
            binding
        })
        .collect();

    let mut record = csv::StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|e| Error::failed("read_csv", e))?
    {
        report.rows_read += 1;
        let line = record.position().map_or(0, csv::Position::line);
        let mut row = table.new_row();

        for (field, binding) in record.iter().zip(&bindings) {
            let Some((index, kind)) = *binding else {
                continue;
            };
            if field.is_empty() {
                continue;
            }
            match parse_cell(field, kind) {
                Some(Cell::Set(value)) => row.set(index, Some(value)),
                Some(Cell::Nulled) => report.nulled_durations += 1,
                None => {
                    return Err(Error::Parse {
                        table: table.name().to_string(),
                        line,
                        column: table.columns()[index].name.clone(),
                        value: field.to_string(),
                        expected: kind,
                    });
                },
            }
        }

        match table.try_push(row) {
            Ok(()) => report.rows_appended += 1,
            Err((reason, row)) => {
                tracing::debug!(table = %table.name(), line, reason = %reason, "Dropping row");
                report.dropped.push(DroppedRow { line, reason, row });
            },
        }
    }

    Ok(report)
}

/// Writes `table` as delimited text: a header line followed by one line per
/// row, columns in declared order.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn encode<W: Write>(table: &Table, writer: W, options: &CsvOptions) -> Result<EncodeReport> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(CsvOptions::terminator())
        .from_writer(writer);

    writer
        .write_record(table.columns().iter().map(|c| c.name.as_str()))
        .map_err(|e| Error::failed("write_csv_headers", e))?;

    let delimiter = options.delimiter();
    let mut report = EncodeReport::default();
    for row in table.rows() {
        let fields: Vec<String> = table
            .columns()
            .iter()
            .zip(row.cells())
            .map(|(column, cell)| {
                cell.as_ref()
                    .map_or_else(String::new, |value| format_cell(value, column.kind, delimiter))
            })
            .collect();
        writer
            .write_record(&fields)
            .map_err(|e| Error::failed("write_csv", e))?;
        report.rows_written += 1;
    }

    writer.flush().map_err(|e| Error::failed("flush_csv", e))?;
    Ok(report)
}

fn parse_cell(raw: &str, kind: ColumnType) -> Option<Cell> {
    let value = match kind {
        ColumnType::Boolean => Value::Boolean(raw.trim().parse::<i64>().ok()? != 0),
        ColumnType::Date => Value::Date(parse_date(raw.trim())?),
        ColumnType::Decimal => Value::Decimal(parse_decimal(raw.trim())?),
        ColumnType::Integer => Value::Integer(raw.trim().parse::<i64>().ok()?),
        ColumnType::Duration => {
            return Some(Duration::parse(raw).map_or(Cell::Nulled, |d| Cell::Set(Value::Duration(d))));
        },
        ColumnType::Text => Value::Text(raw.to_string()),
    };
    Some(Cell::Set(value))
}

/// `YYYYMMDD`, exactly eight ASCII digits naming a real day.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = raw[0..4].parse::<i32>().ok()?;
    let month = raw[4..6].parse::<u32>().ok()?;
    let day = raw[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Plain positional notation only: no exponent, no digit separators.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.contains(['_', 'e', 'E']) {
        return None;
    }
    raw.parse::<Decimal>().ok()
}

fn format_cell(value: &Value, kind: ColumnType, delimiter: char) -> String {
    let text = match value {
        Value::Boolean(b) => return String::from(if *b { "1" } else { "0" }),
        Value::Date(d) => return format!("{:04}{:02}{:02}", d.year(), d.month(), d.day()),
        Value::Decimal(d) => return format_decimal(*d),
        Value::Duration(d) => return d.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Text(s) => s.clone(),
    };
    if kind.is_quotable() && text.contains([delimiter, '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// Up to six fractional digits, no trailing zeros, no exponent.
fn format_decimal(value: Decimal) -> String {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableSchema;
    use std::io::Cursor;

    fn typed_table() -> Table {
        Table::new(
            TableSchema::new("typed.txt")
                .with_column("id", ColumnType::Text)
                .with_column("flag", ColumnType::Boolean)
                .with_column("day", ColumnType::Date)
                .with_column("amount", ColumnType::Decimal)
                .with_column("count", ColumnType::Integer)
                .with_column("time", ColumnType::Duration),
        )
    }

    fn encode_to_string(table: &Table, options: &CsvOptions) -> String {
        let mut output = Vec::new();
        encode(table, &mut output, options).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_decode_typed_values() {
        let input = "id,flag,day,amount,count,time\n1,1,20240131,1.25,42,25:30:10\n";
        let mut table = typed_table();
        let report = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(report.rows_appended, 1);
        assert_eq!(table.value(0, "id"), Some(&Value::from("1")));
        assert_eq!(table.value(0, "flag"), Some(&Value::Boolean(true)));
        assert_eq!(
            table.value(0, "day"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))
        );
        assert_eq!(
            table.value(0, "amount"),
            Some(&Value::Decimal(Decimal::new(125, 2)))
        );
        assert_eq!(table.value(0, "count"), Some(&Value::Integer(42)));
        assert_eq!(
            table.value(0, "time"),
            Some(&Value::Duration(Duration::from_hms(25, 30, 10)))
        );
    }

    #[test]
    fn test_decode_boolean_values() {
        let input = "id,flag\na,1\nb,0\nc,\nd,7\n";
        let mut table = typed_table();
        decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(table.value(0, "flag"), Some(&Value::Boolean(true)));
        assert_eq!(table.value(1, "flag"), Some(&Value::Boolean(false)));
        assert_eq!(table.value(2, "flag"), None);
        assert_eq!(table.value(3, "flag"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_decode_quoted_fields() {
        let input = "id,count\n\"a,\"\"b\"\"\",3\n";
        let mut table = typed_table();
        decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();
        assert_eq!(table.value(0, "id"), Some(&Value::from("a,\"b\"")));
    }

    #[test]
    fn test_decode_ignores_unknown_fields_and_missing_columns() {
        let input = "extra,id,other\nx,1,y\n";
        let mut table = typed_table();
        let report = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(report.ignored_fields, vec!["extra", "other"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "id"), Some(&Value::from("1")));
        assert_eq!(table.value(0, "count"), None);
    }

    #[test]
    fn test_decode_short_lines_leave_trailing_cells_null() {
        let input = "id,count\n1\n";
        let mut table = typed_table();
        decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();
        assert_eq!(table.value(0, "id"), Some(&Value::from("1")));
        assert_eq!(table.value(0, "count"), None);
    }

    #[test]
    fn test_decode_malformed_duration_is_nulled() {
        let input = "id,time\n1,soon\n2,08:00:00\n";
        let mut table = typed_table();
        let report = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(report.nulled_durations, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "time"), None);
    }

    #[test]
    fn test_decode_parse_failure_keeps_earlier_rows() {
        let input = "id,count\n1,10\n2,ten\n3,30\n";
        let mut table = typed_table();
        let err = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap_err();

        match err {
            Error::Parse {
                line,
                column,
                value,
                expected,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "count");
                assert_eq!(value, "ten");
                assert_eq!(expected, ColumnType::Integer);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_decode_rejects_bad_dates_and_booleans() {
        for input in [
            "id,day\n1,2024-01-01\n",
            "id,day\n1,20240230\n",
            "id,flag\n1,yes\n",
            "id,amount\n1,1.2.3\n",
            "id,amount\n1,1e3\n",
            "id,amount\n1,2.5E-1\n",
            "id,amount\n1,1_000\n",
        ] {
            let mut table = typed_table();
            let result = decode(Cursor::new(input), &mut table, &CsvOptions::default());
            assert!(matches!(result, Err(Error::Parse { .. })), "{input}");
        }
    }

    #[test]
    fn test_decode_short_duration_fields() {
        let input = "id,time\n1,8:5:0\n2,12:60:00\n";
        let mut table = typed_table();
        let report = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(report.nulled_durations, 0);
        assert_eq!(
            table.value(0, "time"),
            Some(&Value::Duration(Duration::from_hms(8, 5, 0)))
        );
        assert_eq!(
            table.value(1, "time"),
            Some(&Value::Duration(Duration::from_hms(13, 0, 0)))
        );
    }

    #[test]
    fn test_decode_drops_conflicting_rows_silently() {
        let mut table = Table::new(
            TableSchema::new("stops.txt")
                .with_column("stop_id", ColumnType::Text)
                .with_primary_key(["stop_id"]),
        );
        let input = "stop_id\nA\nA\n\"\"\nB\n";
        let report = decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_dropped(), 2);
        assert_eq!(report.dropped[0].reason, RowRejection::DuplicateKey);
        assert_eq!(report.dropped[0].line, 3);
        assert!(matches!(report.dropped[1].reason, RowRejection::NullKey(_)));
    }

    #[test]
    fn test_decode_with_custom_delimiter() {
        let input = "id|count\na,b|5\n";
        let mut table = typed_table();
        let options = CsvOptions::new('|').unwrap();
        decode(Cursor::new(input), &mut table, &options).unwrap();
        assert_eq!(table.value(0, "id"), Some(&Value::from("a,b")));
        assert_eq!(table.value(0, "count"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_decode_header_with_bom_and_spaces() {
        let input = "\u{feff}id, count\n1,2\n";
        let mut table = typed_table();
        decode(Cursor::new(input), &mut table, &CsvOptions::default()).unwrap();
        assert_eq!(table.value(0, "id"), Some(&Value::from("1")));
        assert_eq!(table.value(0, "count"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_encode_formats_each_type() {
        let mut table = typed_table();
        table
            .insert([
                ("id", Value::from("x")),
                ("flag", Value::Boolean(false)),
                ("day", Value::Date(NaiveDate::from_ymd_opt(987, 3, 4).unwrap())),
                ("amount", Value::Decimal(Decimal::new(12_500_000_123, 9))),
                ("count", Value::Integer(-3)),
                ("time", Value::Duration(Duration::from_hms(105, 2, 3))),
            ])
            .unwrap();
        table.insert([("id", Value::from("y"))]).unwrap();

        let output = encode_to_string(&table, &CsvOptions::default());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "id,flag,day,amount,count,time");
        assert_eq!(lines[1], "x,0,09870304,12.5,-3,105:02:03");
        assert_eq!(lines[2], "y,,,,,");
    }

    #[test]
    fn test_encode_decimal_rounding() {
        assert_eq!(format_decimal(Decimal::new(1_234_567_895, 9)), "1.234568");
        assert_eq!(format_decimal(Decimal::new(-15, 1)), "-1.5");
        assert_eq!(format_decimal(Decimal::new(100, 0)), "100");
        assert_eq!(format_decimal(Decimal::new(12_000, 3)), "12");
        assert_eq!(format_decimal(Decimal::new(-1, 8)), "0");
    }

    #[test]
    fn test_encode_quotes_only_text_and_integers() {
        assert_eq!(format_cell(&Value::from("a,b"), ColumnType::Text, ','), "\"a,b\"");
        assert_eq!(
            format_cell(&Value::from("say \"hi\""), ColumnType::Text, ','),
            "\"say \"\"hi\"\"\""
        );
        assert_eq!(format_cell(&Value::from("a;b"), ColumnType::Text, ','), "a;b");
        assert_eq!(format_cell(&Value::from("a;b"), ColumnType::Text, ';'), "\"a;b\"");
        assert_eq!(format_cell(&Value::Integer(-5), ColumnType::Integer, '-'), "\"-5\"");
        assert_eq!(
            format_cell(&Value::from("line1\nline2"), ColumnType::Text, ','),
            "\"line1\nline2\""
        );
    }

    #[test]
    fn test_encode_header_is_never_quoted() {
        let table = Table::new(TableSchema::new("odd.txt").with_column("a\"b", ColumnType::Text));
        let output = encode_to_string(&table, &CsvOptions::default());
        assert_eq!(output.lines().next(), Some("a\"b"));
    }

    #[test]
    fn test_quoted_text_roundtrip() {
        let original = "He said \"stop, now\", twice";
        let mut table = typed_table();
        table.insert([("id", Value::from(original))]).unwrap();

        let output = encode_to_string(&table, &CsvOptions::default());
        let mut decoded = typed_table();
        decode(Cursor::new(output), &mut decoded, &CsvOptions::default()).unwrap();

        assert_eq!(decoded.value(0, "id"), Some(&Value::from(original)));
    }

    #[test]
    fn test_multiline_text_roundtrip() {
        let mut table = typed_table();
        table.insert([("id", Value::from("line1\nline2"))]).unwrap();
        table.insert([("id", Value::from("a\r\nb"))]).unwrap();

        let output = encode_to_string(&table, &CsvOptions::default());
        let mut decoded = typed_table();
        decode(Cursor::new(output), &mut decoded, &CsvOptions::default()).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.value(0, "id"), Some(&Value::from("line1\nline2")));
        assert_eq!(decoded.value(1, "id"), Some(&Value::from("a\r\nb")));
    }

    #[test]
    fn test_duration_roundtrip_literal() {
        let mut table = typed_table();
        decode(
            Cursor::new("id,time\n1,25:30:10\n"),
            &mut table,
            &CsvOptions::default(),
        )
        .unwrap();
        let output = encode_to_string(&table, &CsvOptions::default());
        assert!(output.lines().nth(1).unwrap().ends_with(",25:30:10"));
    }

    #[test]
    fn test_options_validation() {
        assert!(CsvOptions::new('"').is_err());
        assert!(CsvOptions::new('\n').is_err());
        assert!(CsvOptions::new('é').is_err());
        assert!(CsvOptions::from_delimiter_str("||").is_err());
        assert!(CsvOptions::from_delimiter_str("").is_err());
        assert_eq!(CsvOptions::from_delimiter_str("\t").unwrap().delimiter(), '\t');
    }
}
