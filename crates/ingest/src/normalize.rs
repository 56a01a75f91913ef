//! Header mapping and per-row validation.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use tickerflow_core::vendor::Field;
use tickerflow_core::{PriceRecord, Vendor};

use crate::IngestError;

/// One rejected row, kept for the outcome record.
#[derive(Debug, Clone, Serialize)]
pub struct RowIssue {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub reason: String,
}

/// Result of normalizing a whole file within tolerance.
#[derive(Debug)]
pub struct NormalizeReport {
    pub records: Vec<PriceRecord>,
    pub issues: Vec<RowIssue>,
    /// Data rows seen (excluding the header).
    pub total_rows: usize,
}

/// Read a CSV file into its header and data rows.
pub fn read_csv(path: &Path) -> Result<(StringRecord, Vec<StringRecord>), IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((headers, rows))
}

/// Read and normalize a file in one step.
pub fn normalize_file(
    path: &Path,
    vendor: Vendor,
    ticker: &str,
    tolerance: f64,
) -> Result<NormalizeReport, IngestError> {
    let (headers, rows) = read_csv(path)?;
    normalize(&headers, &rows, vendor, ticker, tolerance)
}

/// Normalize raw rows into canonical records.
///
/// A header missing the date column or every price column fails the whole
/// file before anything is written. Bad rows are collected; the file passes
/// with a partial record set while `bad / total <= tolerance`, otherwise it
/// fails as a whole. Duplicate dates within one file collapse to the last
/// occurrence.
pub fn normalize(
    headers: &StringRecord,
    rows: &[StringRecord],
    vendor: Vendor,
    ticker: &str,
    tolerance: f64,
) -> Result<NormalizeReport, IngestError> {
    let columns = resolve_columns(headers, vendor)?;
    let date_col = columns
        .iter()
        .find(|(_, f)| *f == Field::Date)
        .map(|(i, _)| *i)
        .ok_or_else(|| IngestError::MissingColumns("date".to_string()))?;

    if rows.is_empty() {
        return Err(IngestError::Empty);
    }

    let mut records: Vec<PriceRecord> = Vec::with_capacity(rows.len());
    let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();
    let mut issues = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 2;
        match normalize_row(row, date_col, &columns, ticker) {
            Ok(record) => match by_date.get(&record.date) {
                // Same date twice in one file: the later row wins, matching
                // the store's conflict semantics.
                Some(&at) => records[at] = record,
                None => {
                    by_date.insert(record.date, records.len());
                    records.push(record);
                }
            },
            Err(reason) => issues.push(RowIssue { line, reason }),
        }
    }

    let total = rows.len();
    let bad = issues.len();
    let frac = bad as f64 / total as f64;
    if frac > tolerance || records.is_empty() {
        return Err(IngestError::TooManyBadRows {
            bad,
            total,
            tolerance,
        });
    }

    debug!(ticker, %vendor, rows = records.len(), skipped = bad, "normalized");
    Ok(NormalizeReport {
        records,
        issues,
        total_rows: total,
    })
}

/// Map header names to canonical fields for this vendor.
///
/// Hard failure when the date column is absent or no price column matched.
fn resolve_columns(
    headers: &StringRecord,
    vendor: Vendor,
) -> Result<Vec<(usize, Field)>, IngestError> {
    let map = vendor.column_map();
    let mut columns = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        let name = name.trim();
        if let Some((_, field)) = map.iter().find(|(n, _)| *n == name) {
            columns.push((idx, *field));
        }
    }

    let has_date = columns.iter().any(|(_, f)| *f == Field::Date);
    let has_price = columns.iter().any(|(_, f)| f.is_price());
    if !has_date || !has_price {
        let mut missing = Vec::new();
        if !has_date {
            missing.push("date");
        }
        if !has_price {
            missing.push("a price column");
        }
        return Err(IngestError::MissingColumns(missing.join(", ")));
    }
    Ok(columns)
}

fn normalize_row(
    row: &StringRecord,
    date_col: usize,
    columns: &[(usize, Field)],
    ticker: &str,
) -> Result<PriceRecord, String> {
    let raw_date = row.get(date_col).unwrap_or("").trim();
    let date = parse_iso_date(raw_date)?;
    let mut record = PriceRecord::new(ticker, date);

    for (idx, field) in columns {
        let cell = row.get(*idx).unwrap_or("").trim();
        if cell.is_empty() || *field == Field::Date {
            continue;
        }
        match field {
            Field::Volume => record.volume = Some(parse_volume(cell)?),
            Field::AdjVolume => record.adj_volume = Some(parse_volume(cell)?),
            Field::DivCash => record.div_cash = Some(parse_decimal(cell, "divCash", false)?),
            Field::SplitFactor => {
                record.split_factor = Some(parse_decimal(cell, "splitFactor", false)?)
            }
            Field::Open => record.open = Some(parse_decimal(cell, "open", true)?),
            Field::High => record.high = Some(parse_decimal(cell, "high", true)?),
            Field::Low => record.low = Some(parse_decimal(cell, "low", true)?),
            Field::Close => record.close = Some(parse_decimal(cell, "close", true)?),
            Field::AdjOpen => record.adj_open = Some(parse_decimal(cell, "adjOpen", true)?),
            Field::AdjHigh => record.adj_high = Some(parse_decimal(cell, "adjHigh", true)?),
            Field::AdjLow => record.adj_low = Some(parse_decimal(cell, "adjLow", true)?),
            Field::AdjClose => record.adj_close = Some(parse_decimal(cell, "adjClose", true)?),
            Field::Date => {}
        }
    }
    Ok(record)
}

/// ISO calendar date; Tiingo exports carry a `T00:00:00.000Z` suffix which is
/// tolerated by parsing the date part only.
fn parse_iso_date(s: &str) -> Result<NaiveDate, String> {
    if s.is_empty() {
        return Err("empty date".to_string());
    }
    let date_part = match s.split_once('T') {
        Some((d, _)) => d,
        None => s,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| format!("bad date `{s}`"))
}

fn parse_decimal(s: &str, name: &str, price: bool) -> Result<Decimal, String> {
    let value = Decimal::from_str(s).map_err(|_| format!("bad {name} `{s}`"))?;
    if price && value.is_sign_negative() {
        return Err(format!("negative {name} `{s}`"));
    }
    Ok(value)
}

/// Non-negative integer; an integral decimal like `1234.0` (seen in FMP
/// exports) is accepted.
fn parse_volume(s: &str) -> Result<i64, String> {
    let value = match s.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let d = Decimal::from_str(s).map_err(|_| format!("bad volume `{s}`"))?;
            if d.fract() != Decimal::ZERO {
                return Err(format!("bad volume `{s}`"));
            }
            d.to_i64().ok_or_else(|| format!("bad volume `{s}`"))?
        }
    };
    if value < 0 {
        return Err(format!("negative volume `{s}`"));
    }
    Ok(value)
}
