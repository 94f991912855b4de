use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, instrument};

use crate::constants::*;
use crate::domain::{normalize_text, ExtractRecord, Measures};
use crate::error::{EtlError, Result};

/// One cleaned, schema-complete source file.
#[derive(Debug, Clone)]
pub struct ExtractBatch {
    pub path: PathBuf,
    pub encoding: &'static str,
    pub records: Vec<ExtractRecord>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub latest_run_date: Option<NaiveDate>,
}

/// Read a file as UTF-8, falling back to Windows-1252 (a superset of
/// ISO-8859-1) when the bytes are not valid UTF-8.
pub fn read_as_utf8(path: &Path) -> Result<(String, &'static str)> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok((s, "utf-8")),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok((decoded.into_owned(), encoding_rs::WINDOWS_1252.name()))
        }
    }
}

/// Header name to column position, with trimmed lower-case names.
pub(crate) struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub(crate) fn new(headers: &csv::StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), i))
            .collect();
        Self { positions }
    }

    pub(crate) fn has(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    pub(crate) fn require(&self, columns: &[&str], file: &Path) -> Result<()> {
        match columns.iter().find(|c| !self.has(c)) {
            Some(column) => Err(EtlError::MissingColumn {
                file: file.to_path_buf(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Trimmed cell value; `None` when the column is absent from this file.
    pub(crate) fn cell<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        self.positions
            .get(column)
            .map(|&i| record.get(i).unwrap_or("").trim())
    }
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn malformed(column: &str, value: &str, record: &csv::StringRecord) -> EtlError {
    EtlError::MalformedValue {
        column: column.to_string(),
        value: value.to_string(),
        line: line_of(record),
    }
}

/// Integral count. Accepts `12` and `12.0`; blank stays null. Values outside
/// the `i64` range are rejected.
fn parse_count(raw: &str) -> Option<std::result::Result<i64, ()>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(Ok(v));
    }
    Some(match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&v) => Ok(v as i64),
        _ => Err(()),
    })
}

/// Percentage or delay; blank reads as zero.
fn parse_rate(raw: &str) -> std::result::Result<f64, ()> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>().map_err(|_| ())
}

/// Lenient run-date parse; anything unrecognised becomes null.
fn parse_run_date(raw: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%b-%y", "%d-%b-%Y"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M"];

    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

/// First day of the month named by a `YYYYMM` reporting period.
pub fn period_date(reporting_period: &str) -> Option<NaiveDate> {
    let digits = reporting_period.trim();
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{}01", digits), "%Y%m%d").ok()
}

/// Turns one raw monthly extract into a clean batch ready for resolution.
pub struct ExtractNormalizer;

impl ExtractNormalizer {
    #[instrument(skip_all, fields(file = %path.display()))]
    pub fn normalize_file(path: &Path) -> Result<ExtractBatch> {
        let (content, encoding) = read_as_utf8(path)?;
        let mut batch = Self::normalize_str(&content, path)?;
        batch.encoding = encoding;
        debug!(encoding, rows = batch.records.len(), "Normalized extract");
        Ok(batch)
    }

    pub fn normalize_str(content: &str, path: &Path) -> Result<ExtractBatch> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let columns = ColumnIndex::new(reader.headers()?);
        columns.require(&required_columns(), path)?;

        let mut batch = ExtractBatch {
            path: path.to_path_buf(),
            encoding: "utf-8",
            records: Vec::new(),
            rows_read: 0,
            rows_dropped: 0,
            latest_run_date: None,
        };

        for result in reader.records() {
            let row = result?;
            batch.rows_read += 1;
            match Self::normalize_row(&columns, &row)? {
                Some(record) => {
                    batch.latest_run_date = batch.latest_run_date.max(record.run_date);
                    batch.records.push(record);
                }
                None => batch.rows_dropped += 1,
            }
        }
        Ok(batch)
    }

    /// `Ok(None)` for rows missing an airport or airline name.
    fn normalize_row(columns: &ColumnIndex, row: &csv::StringRecord) -> Result<Option<ExtractRecord>> {
        let text = |column: &str| normalize_text(columns.cell(row, column).unwrap_or(""));

        let reporting_airport = text(REPORTING_AIRPORT);
        let airline_name = text(AIRLINE_NAME);
        if reporting_airport.is_empty() || airline_name.is_empty() {
            return Ok(None);
        }

        let reporting_period = columns.cell(row, REPORTING_PERIOD).unwrap_or("").to_string();
        let period_date =
            period_date(&reporting_period).ok_or_else(|| malformed(REPORTING_PERIOD, &reporting_period, row))?;

        let count = |column: &str| -> Result<Option<i64>> {
            match columns.cell(row, column) {
                // Backfilled: column absent from this year's extract.
                None => Ok(Some(0)),
                Some(raw) => parse_count(raw)
                    .transpose()
                    .map_err(|_| malformed(column, raw, row)),
            }
        };
        let rate = |column: &str| -> Result<f64> {
            match columns.cell(row, column) {
                None => Ok(0.0),
                Some(raw) => parse_rate(raw).map_err(|_| malformed(column, raw, row)),
            }
        };

        let mut measures = Measures::default();
        for (slot, column) in COUNT_MEASURES.into_iter().enumerate() {
            measures.counts[slot] = count(column)?;
        }
        for (slot, column) in RATE_MEASURES.into_iter().enumerate() {
            measures.rates[slot] = rate(column)?;
        }
        measures.previous_year_flights_matched = count(PREVIOUS_YEAR_MONTH_FLIGHTS_MATCHED)?;
        measures.previous_year_early_to_15_late_percent = rate(PREVIOUS_YEAR_EARLY_TO_15_LATE_PERCENT)?;
        measures.previous_year_average_delay = rate(PREVIOUS_YEAR_AVERAGE_DELAY)?;

        Ok(Some(ExtractRecord {
            reporting_period: reporting_period.trim().to_string(),
            period_date,
            run_date: columns.cell(row, RUN_DATE).and_then(parse_run_date),
            reporting_airport,
            airline_name,
            origin_destination: text(ORIGIN_DESTINATION),
            origin_destination_country: text(ORIGIN_DESTINATION_COUNTRY),
            scheduled_charter: text(SCHEDULED_CHARTER),
            measures,
        }))
    }
}
