//! Data loading for raw multi-symbol price tables.
//!
//! Input tables are read with [`csv`] and mapped onto the four logical columns
//! (Date, Symbol, Open, Close) through a fixed alias table. Rows with a missing
//! field or a non-numeric price are dropped and counted; they never fail a load.

use crate::error::{PipelineError, Result};
use crate::types::RawObservation;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Logical input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date,
    Symbol,
    Open,
    Close,
}

/// Accepted header spellings per logical column, compared case-insensitively.
pub const COLUMN_ALIASES: &[(Column, &[&str])] = &[
    (
        Column::Date,
        &["date", "timestamp", "time", "datetime", "day", "trade_date"],
    ),
    (
        Column::Symbol,
        &["symbol", "ticker", "name", "asset", "stock", "code"],
    ),
    (Column::Open, &["open", "o", "open_price", "opening"]),
    (
        Column::Close,
        &["close", "c", "close_price", "closing", "adj close", "adj_close"],
    ),
];

impl Column {
    /// Resolve a header cell to a logical column, if it is a known alias.
    pub fn resolve(header: &str) -> Option<Column> {
        let needle = header.trim().trim_start_matches('\u{feff}').to_lowercase();
        COLUMN_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| *a == needle))
            .map(|(column, _)| *column)
    }
}

/// Positions of the logical columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub symbol: Option<usize>,
    pub open: usize,
    pub close: usize,
}

impl ColumnMap {
    /// Build the column map from a header record. The first matching header
    /// wins when several cells alias the same column.
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut date = None;
        let mut symbol = None;
        let mut open = None;
        let mut close = None;

        for (idx, cell) in headers.iter().enumerate() {
            let slot = match Column::resolve(cell) {
                Some(Column::Date) => &mut date,
                Some(Column::Symbol) => &mut symbol,
                Some(Column::Open) => &mut open,
                Some(Column::Close) => &mut close,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }

        let missing: Vec<&str> = [("Date", date), ("Open", open), ("Close", close)]
            .iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| *name)
            .collect();

        match (date, open, close) {
            (Some(date), Some(open), Some(close)) => Ok(Self {
                date,
                symbol,
                open,
                close,
            }),
            _ => Err(PipelineError::DataError(format!(
                "Missing required column(s): {} (headers: {:?})",
                missing.join(", "),
                headers.iter().collect::<Vec<_>>()
            ))),
        }
    }
}

/// Data source configuration.
#[derive(Debug, Clone, Default)]
pub struct DataConfig {
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Symbol used for rows when the table has no Symbol column.
    /// Defaults to the file stem when loading from a path.
    pub default_symbol: Option<String>,
}

/// Detect the CSV delimiter by analyzing the first few lines of the file.
///
/// Tries comma, tab, semicolon and pipe, and returns the one that produces the
/// most consistent column count across lines.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let lines: Vec<String> = reader.lines().take(5).filter_map(|l| l.ok()).collect();
    if lines.is_empty() {
        return Ok(b',');
    }

    let delimiters = [b',', b'\t', b';', b'|'];
    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in &delimiters {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();

        // Date, Open and Close at minimum
        let first_count = counts[0];
        let all_consistent = counts.iter().all(|&c| c == first_count);
        if all_consistent && first_count >= 3 && first_count > best_score {
            best_score = first_count;
            best_delimiter = delim;
        }
    }

    debug!(
        "Detected delimiter {:?} with score {}",
        best_delimiter as char, best_score
    );
    Ok(best_delimiter)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y%m%d",
    "%d-%b-%Y",  // 15-Jan-2024
    "%d %b %Y",  // 15 Jan 2024
    "%b %d, %Y", // Jan 15, 2024
];

/// Date-only formats tried after separators have been normalized to '-'.
const NORMALIZED_DATE_FORMATS: &[&str] =
    &["%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%Y-%m-%d %H:%M:%S"];

fn midnight(d: NaiveDate) -> Option<NaiveDateTime> {
    d.and_hms_opt(0, 0, 0)
}

fn parse_with(s: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, format)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, format).ok().and_then(midnight))
}

/// Direct chronological parse: explicit format first, then the common formats.
fn parse_direct(s: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(dt) = format.and_then(|fmt| parse_with(s, fmt)) {
        return Some(dt);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(midnight)
        })
}

/// Replace periods and slashes with a single '-' delimiter.
pub fn normalize_separators(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '.' || c == '/' { '-' } else { c })
        .collect()
}

/// Parse a date string with the direct formats, falling back to a retry on the
/// separator-normalized text. Returns None when both attempts fail.
pub fn parse_date(s: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if let Some(dt) = parse_direct(trimmed, format) {
        return Some(dt);
    }

    let normalized = normalize_separators(trimmed);
    if normalized == trimmed {
        return None;
    }
    NORMALIZED_DATE_FORMATS
        .iter()
        .find_map(|fmt| parse_with(&normalized, fmt))
}

/// Day-first formats and their month-first reading.
const DAY_MONTH_PAIRS: &[(&str, &str)] = &[
    ("%d/%m/%Y %H:%M:%S", "%m/%d/%Y %H:%M:%S"),
    ("%d-%m-%Y", "%m/%d/%Y"),
    ("%d/%m/%Y", "%m/%d/%Y"),
];

/// Parse with a single format, retrying on the separator-normalized text.
pub fn parse_date_as(s: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if let Some(dt) = parse_with(trimmed, format) {
        return Some(dt);
    }
    let normalized = normalize_separators(trimmed);
    if normalized == trimmed {
        return None;
    }
    parse_with(&normalized, &format.replace('/', "-"))
}

/// Find one format that reads every string in `dates`.
///
/// A whole load must agree on day/month order: `01/05/2024` next to
/// `01/13/2024` is month-first for both. `preferred` is tried before the
/// built-in formats. When both orders read every date, day-first wins and a
/// warning is logged. Returns None when no single format covers all dates.
pub fn infer_date_format<'a>(dates: &[&str], preferred: Option<&'a str>) -> Option<&'a str> {
    if dates.is_empty() {
        return None;
    }
    let reads_all = |format: &str| dates.iter().all(|d| parse_date_as(d, format).is_some());

    let chosen = preferred
        .into_iter()
        .chain(DATETIME_FORMATS.iter().copied())
        .chain(DATE_FORMATS.iter().copied())
        .find(|format| reads_all(*format))?;

    if preferred != Some(chosen) {
        if let Some(&(_, month_first)) = DAY_MONTH_PAIRS.iter().find(|(day, _)| *day == chosen) {
            let disagree = dates
                .iter()
                .filter(|d| parse_date_as(d, chosen) != parse_date_as(d, month_first))
                .count();
            if disagree > 0 && reads_all(month_first) {
                warn!(
                    "Day/month order is ambiguous for {} date(s); reading them day-first ({}). \
                     Set date_format to override",
                    disagree, chosen
                );
            }
        }
    }
    debug!("Reading {} distinct dates with format {}", dates.len(), chosen);
    Some(chosen)
}

fn parse_price(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Read observations from any CSV reader.
///
/// The first record must be a header row. Rows without a usable date, symbol,
/// open or close are skipped.
pub fn load_csv_from_reader<R: Read>(
    reader: R,
    config: &DataConfig,
) -> Result<Vec<RawObservation>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter.unwrap_or(b','))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(reader.headers()?)?;
    if columns.symbol.is_none() && config.default_symbol.is_none() {
        return Err(PipelineError::DataError(
            "No Symbol column and no default symbol configured".to_string(),
        ));
    }

    let mut observations = Vec::new();
    let mut skipped = 0;

    for (row_num, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };

        let symbol = match columns.symbol {
            Some(idx) => record.get(idx).map(str::to_string),
            None => config.default_symbol.clone(),
        };
        let date = record.get(columns.date).map(str::to_string);
        let open = parse_price(record.get(columns.open));
        let close = parse_price(record.get(columns.close));

        let obs = match (symbol, date, open, close) {
            (Some(symbol), Some(date), Some(open), Some(close)) => {
                RawObservation::new(symbol.trim(), date.trim(), open, close)
            }
            _ => {
                debug!("Skipping row {}: missing or non-numeric field", row_num + 1);
                skipped += 1;
                continue;
            }
        };

        if !obs.validate() {
            debug!("Skipping row {}: {:?}", row_num + 1, obs);
            skipped += 1;
            continue;
        }
        observations.push(obs);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }
    Ok(observations)
}

/// Read observations from an in-memory CSV string.
pub fn load_csv_from_str(content: &str, config: &DataConfig) -> Result<Vec<RawObservation>> {
    load_csv_from_reader(content.as_bytes(), config)
}

/// Load observations from a CSV file.
///
/// When the file has no Symbol column, the configured default symbol is used,
/// or else the file stem (`data/AAPL.csv` → `AAPL`).
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<RawObservation>> {
    let path = path.as_ref();
    info!("Loading data from: {}", path.display());

    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let default_symbol = config.default_symbol.clone().or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
    });

    let file_config = DataConfig {
        delimiter: Some(delimiter),
        default_symbol,
    };
    let observations = load_csv_from_reader(File::open(path)?, &file_config)?;

    if observations.is_empty() {
        warn!("No valid rows in {}", path.display());
    } else {
        info!("Loaded {} rows from {}", observations.len(), path.display());
    }
    Ok(observations)
}

/// Files in a directory matching a glob pattern, in sorted path order.
pub fn list_files(dir: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PipelineError::DataError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let glob_pattern = dir.join(pattern);
    let glob_pattern_str = glob_pattern.to_string_lossy();
    debug!("Listing files matching: {}", glob_pattern_str);

    let mut paths: Vec<PathBuf> = glob::glob(&glob_pattern_str)
        .map_err(|e| {
            PipelineError::DataError(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Glob error: {}", e);
                None
            }
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load all files in a directory matching a glob pattern (e.g. `*.csv`).
///
/// Files are read in sorted path order; files that fail to load are logged
/// and skipped unless none load at all.
pub fn load_dir(
    dir: impl AsRef<Path>,
    pattern: &str,
    config: &DataConfig,
) -> Result<Vec<RawObservation>> {
    let dir = dir.as_ref();
    let paths = list_files(dir, pattern)?;
    info!("Loading {} files from {}", paths.len(), dir.display());

    let mut observations = Vec::new();
    let mut loaded = 0;
    let mut errors = 0;

    for path in &paths {
        match load_csv(path, config) {
            Ok(rows) => {
                observations.extend(rows);
                loaded += 1;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                errors += 1;
            }
        }
    }

    if loaded == 0 && errors > 0 {
        return Err(PipelineError::DataError(format!(
            "No files loaded from {}. {} errors occurred.",
            dir.display(),
            errors
        )));
    }

    info!("Loaded {} files from {} ({} errors)", loaded, dir.display(), errors);
    Ok(observations)
}

/// Load from a file or a directory of CSV files.
pub fn load_source(path: impl AsRef<Path>, config: &DataConfig) -> Result<Vec<RawObservation>> {
    let path = path.as_ref();
    if path.is_dir() {
        load_dir(path, "*.csv", config)
    } else {
        load_csv(path, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_column_aliases() {
        assert_eq!(Column::resolve("Date"), Some(Column::Date));
        assert_eq!(Column::resolve("  TICKER "), Some(Column::Symbol));
        assert_eq!(Column::resolve("Adj Close"), Some(Column::Close));
        assert_eq!(Column::resolve("OPEN"), Some(Column::Open));
        assert_eq!(Column::resolve("\u{feff}date"), Some(Column::Date));
        assert_eq!(Column::resolve("volume"), None);
    }

    #[test]
    fn test_column_map_first_alias_wins() {
        let headers = StringRecord::from(vec!["Date", "Symbol", "Open", "Close", "Adj Close"]);
        let map = ColumnMap::from_headers(&headers).unwrap();
        assert_eq!(map.close, 3);
        assert_eq!(map.symbol, Some(1));
    }

    #[test]
    fn test_column_map_missing_required() {
        let headers = StringRecord::from(vec!["Date", "Symbol", "High"]);
        let err = ColumnMap::from_headers(&headers).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Open"));
        assert!(msg.contains("Close"));
    }

    #[test]
    fn test_date_parsing() {
        let dt = parse_date("2024-01-15", None).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 15));

        let dt = parse_date("2024-01-15 09:30:00", None).unwrap();
        assert_eq!(dt.hour(), 9);

        let dt = parse_date("15-Jan-2024", None).unwrap();
        assert_eq!(dt.day(), 15);

        let dt = parse_date("Jan 15, 2024", None).unwrap();
        assert_eq!(dt.month(), 1);
    }

    #[test]
    fn test_date_parsing_separator_fallback() {
        let dt = parse_date("2024.03.07", None).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 7));

        let dt = parse_date("07.03.2024", None).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 7));

        assert_eq!(normalize_separators(" 2024/03.07 "), "2024-03-07");
    }

    #[test]
    fn test_date_parsing_explicit_format() {
        let dt = parse_date("03|07|2024", Some("%m|%d|%Y")).unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 7));
    }

    #[test]
    fn test_date_parsing_failure() {
        assert!(parse_date("not a date", None).is_none());
        assert!(parse_date("2024-13-45", None).is_none());
    }

    #[test]
    fn test_infer_date_format_resolves_month_first() {
        let dates = ["01/05/2024", "01/13/2024"];
        assert_eq!(infer_date_format(&dates, None), Some("%m/%d/%Y"));

        let us = parse_date_as("01/05/2024", "%m/%d/%Y").unwrap();
        assert_eq!((us.month(), us.day()), (1, 5));
    }

    #[test]
    fn test_infer_date_format_ambiguous_defaults_to_day_first() {
        let dates = ["02/03/2024", "04/05/2024"];
        let chosen = infer_date_format(&dates, None).unwrap();
        let dt = parse_date_as("02/03/2024", chosen).unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 2));

        assert_eq!(infer_date_format(&dates, Some("%m/%d/%Y")), Some("%m/%d/%Y"));
    }

    #[test]
    fn test_infer_date_format_normalized_separators() {
        let dates = ["2024-01-02", "2024.01.03", "2024/01/04"];
        assert_eq!(infer_date_format(&dates, None), Some("%Y-%m-%d"));
        assert!(parse_date_as("01.13.2024", "%m/%d/%Y").is_some());
    }

    #[test]
    fn test_infer_date_format_mixed_styles() {
        assert_eq!(infer_date_format(&["2024-01-02", "Jan 15, 2024"], None), None);
        assert_eq!(infer_date_format(&[], None), None);
    }

    #[test]
    fn test_load_csv_from_str_drops_invalid_rows() {
        let csv = "\
Date,Symbol,Open,Close
2024-01-02,AAA,10,11
2024-01-03,AAA,abc,11
2024-01-04,,10,11
2024-01-05,AAA,10,
,AAA,10,11
2024-01-06,BBB,5,6
";
        let rows = load_csv_from_str(csv, &DataConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RawObservation::new("AAA", "2024-01-02", 10.0, 11.0));
        assert_eq!(rows[1].symbol, "BBB");
    }

    #[test]
    fn test_load_csv_without_symbol_column_needs_default() {
        let csv = "date,open,close\n2024-01-02,1,2\n";
        assert!(load_csv_from_str(csv, &DataConfig::default()).is_err());

        let config = DataConfig {
            default_symbol: Some("XYZ".into()),
            ..Default::default()
        };
        let rows = load_csv_from_str(csv, &config).unwrap();
        assert_eq!(rows[0].symbol, "XYZ");
    }

    #[test]
    fn test_load_csv_file_detects_delimiter_and_symbol() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MSFT.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Date;Open;High;Close").unwrap();
        writeln!(file, "2024-01-02;100;105;102").unwrap();
        writeln!(file, "2024-01-03;102;108;107").unwrap();
        drop(file);

        let rows = load_csv(&path, &DataConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.symbol == "MSFT"));
        assert_eq!(rows[1].close, 107.0);
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        for (name, close) in [("AAA", 1.0), ("BBB", 2.0)] {
            let mut file = File::create(dir.path().join(format!("{}.csv", name))).unwrap();
            writeln!(file, "Date,Open,Close").unwrap();
            writeln!(file, "2024-01-02,1,{}", close).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows = load_dir(dir.path(), "*.csv", &DataConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AAA");
        assert_eq!(rows[1].symbol, "BBB");

        let rows = load_source(dir.path(), &DataConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_load_dir_not_a_directory() {
        let file = NamedTempFile::new().unwrap();
        assert!(load_dir(file.path(), "*.csv", &DataConfig::default()).is_err());
    }
}
