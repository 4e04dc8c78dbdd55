//! Edge CSV ingest.
//!
//! One row per image row, with the pixel column of each icicle edge:
//!
//! ```text
//! left,right
//! 612.0,668.5
//! ```
//!
//! Rows are read in file order (base first for camera images). Extra columns
//! are ignored; header names are matched case-insensitively.
//!
//! Each row is one image row, so its position fixes its `z`. A malformed row
//! cannot be skipped without shifting every row after it, and any bad row
//! fails the whole file.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;

use crate::error::AppError;

/// Row errors listed before the rest are summarized as a count.
const MAX_LISTED_ROW_ERRORS: usize = 10;

/// Per-row parse problem.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Pixel edges read from CSV, one entry per image row.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRows {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct EdgeRecord {
    left: f64,
    right: f64,
}

/// Load `left,right` pixel columns.
pub fn load_edges(path: &Path) -> Result<EdgeRows, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_edges(file)
}

/// Parse edge rows from any reader.
pub fn read_edges<R: std::io::Read>(reader: R) -> Result<EdgeRows, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let (Some(&left_col), Some(&right_col)) = (header_map.get("left"), header_map.get("right")) else {
        return Err(AppError::new(2, "CSV must have 'left' and 'right' columns."));
    };

    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut row_errors = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header is line 1.
        let line = idx + 2;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match (parse_f64(&record, left_col, "left"), parse_f64(&record, right_col, "right")) {
            (Ok(l), Ok(r)) => {
                left.push(l);
                right.push(r);
            }
            (Err(message), _) | (_, Err(message)) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "{} malformed edge row(s); rows map to z positions and cannot be skipped:\n{}",
                row_errors.len(),
                format_row_errors(&row_errors)
            ),
        ));
    }
    if left.is_empty() {
        return Err(AppError::new(3, "No edge rows in CSV."));
    }

    Ok(EdgeRows { left, right })
}

/// List per-row CSV problems (first few, then a count).
pub fn format_row_errors(errors: &[RowError]) -> String {
    let mut out = String::new();
    for err in errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        out.push_str(&format!("  line {}: {}\n", err.line, err.message));
    }
    let hidden = errors.len().saturating_sub(MAX_LISTED_ROW_ERRORS);
    if hidden > 0 {
        out.push_str(&format!("  ... and {hidden} more\n"));
    }
    out
}

/// Write `left,right` pixel columns.
pub fn write_edges_csv(path: &Path, left: &[f64], right: &[f64]) -> Result<(), AppError> {
    if left.len() != right.len() {
        return Err(AppError::new(2, "Left and right edges differ in length."));
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    for (&l, &r) in left.iter().zip(right) {
        writer
            .serialize(EdgeRecord { left: l, right: r })
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_f64(record: &StringRecord, col: usize, name: &str) -> Result<f64, String> {
    let raw = record.get(col).ok_or_else(|| format!("missing '{name}' value"))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid '{name}' value '{raw}'"))?;
    if !value.is_finite() {
        return Err(format!("non-finite '{name}' value '{raw}'"));
    }
    Ok(value)
}
