//! Decoding uploads into raw rows.
//!
//! Each row comes paired with its origin index: the spreadsheet line for CSV
//! and workbook uploads (header = line 1, so data starts at 2) and the
//! 1-based array position for JSON payloads. Blank lines are skipped but keep
//! their numbering, so errors point at the line the user sees.

use std::fmt;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xls, Xlsx};
use csv::{ReaderBuilder, Trim};
use serde_json::Value;

use crate::error_handling::ImportError;
use crate::import::normalize::RawRow;

/// A raw row and the origin index reported on its errors.
pub type SourceRow = (usize, RawRow);

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";

/// Content types accepted on the spreadsheet endpoint. Browsers label CSV
/// files inconsistently, so the bytes decide the actual format.
const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    XLSX_MIME,
    XLS_MIME,
    "text/csv",
    "application/csv",
    "text/plain",
    "application/octet-stream",
];

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Spreadsheet formats read by the import endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Csv,
    Xlsx,
    Xls,
}

impl SpreadsheetFormat {
    /// Checks the declared content type against the accepted list, then picks
    /// the format from the file signature.
    pub fn detect(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, ImportError> {
        if let Some(content_type) = content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !essence.is_empty() && !ACCEPTED_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(ImportError::InvalidPayload(format!(
                    "unsupported file format: {essence}"
                )));
            }
        }

        Ok(if bytes.starts_with(ZIP_SIGNATURE) {
            Self::Xlsx
        } else if bytes.starts_with(OLE_SIGNATURE) {
            Self::Xls
        } else {
            Self::Csv
        })
    }
}

/// Reads a spreadsheet upload in whichever format it arrived.
pub fn rows_from_upload(
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<Vec<SourceRow>, ImportError> {
    match SpreadsheetFormat::detect(content_type, bytes)? {
        SpreadsheetFormat::Csv => rows_from_csv(bytes),
        SpreadsheetFormat::Xlsx => rows_from_workbook::<Xlsx<Cursor<Vec<u8>>>>(bytes),
        SpreadsheetFormat::Xls => rows_from_workbook::<Xls<Cursor<Vec<u8>>>>(bytes),
    }
}

/// Physical line numbers over a CSV upload.
///
/// The csv reader stamps a record with the position where it started
/// reading, which is before any blank lines it skipped on the way.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            line: 1,
        }
    }

    /// Line of the first non-blank byte at or after `start`.
    fn line_at(&mut self, start: usize) -> usize {
        self.advance_to(start.max(self.offset).min(self.bytes.len()));
        let blank = self.bytes[self.offset..]
            .iter()
            .take_while(|b| matches!(b, b'\r' | b'\n'))
            .count();
        self.advance_to(self.offset + blank);
        self.line
    }

    fn advance_to(&mut self, end: usize) {
        for i in self.offset..end {
            match self.bytes[i] {
                b'\n' => self.line += 1,
                b'\r' if self.bytes.get(i + 1) != Some(&b'\n') => self.line += 1,
                _ => {}
            }
        }
        self.offset = end;
    }
}

/// Reads a CSV upload. Records whose cells are all blank are skipped.
pub fn rows_from_csv(bytes: &[u8]) -> Result<Vec<SourceRow>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::InvalidPayload(format!("unreadable CSV header: {e}")))?
        .clone();

    let mut lines = LineCounter::new(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ImportError::InvalidPayload(format!("unreadable CSV row: {e}")))?;
        let start = record.position().map_or(0, |p| p.byte() as usize);
        let line = lines.line_at(start);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let raw: RawRow = headers.iter().zip(record.iter()).collect();
        rows.push((line, raw));
    }
    Ok(rows)
}

/// Reads the first worksheet of an XLSX or XLS workbook.
fn rows_from_workbook<R>(bytes: &[u8]) -> Result<Vec<SourceRow>, ImportError>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: fmt::Display,
{
    let unreadable =
        |e: R::Error| ImportError::InvalidPayload(format!("unreadable workbook: {e}"));

    let mut workbook = R::new(Cursor::new(bytes.to_vec())).map_err(unreadable)?;
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(rows_from_range(&range.map_err(unreadable)?)),
        None => Ok(Vec::new()),
    }
}

fn rows_from_range(range: &Range<Data>) -> Vec<SourceRow> {
    // `start` is the absolute (row, column) of the first used cell, 0-based.
    let header_line = range.start().map_or(1, |(row, _)| row as usize + 1);
    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header.iter().map(sheet_cell_text).collect();

    sheet_rows
        .enumerate()
        .filter_map(|(i, cells)| {
            let cells: Vec<String> = cells.iter().map(sheet_cell_text).collect();
            if cells.iter().all(String::is_empty) {
                return None;
            }
            let raw: RawRow = headers.iter().cloned().zip(cells).collect();
            Some((header_line + 1 + i, raw))
        })
        .collect()
}

fn sheet_cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => whole_number_text(*f).unwrap_or_else(|| f.to_string()),
        other => other.to_string().trim().to_string(),
    }
}

/// Phone numbers typed into numeric cells arrive as floats.
fn whole_number_text(value: f64) -> Option<String> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15).then(|| format!("{value:.0}"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(whole_number_text)
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Reads a JSON array of objects.
///
/// Non-string values are rendered as text; `null` counts as empty. An element
/// that is not an object yields an empty row, which the normalizer rejects.
pub fn rows_from_json(payload: &Value) -> Result<Vec<SourceRow>, ImportError> {
    let items = payload
        .as_array()
        .ok_or_else(|| ImportError::InvalidPayload("expected a JSON array of chips".into()))?;

    Ok(items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let raw: RawRow = item
                .as_object()
                .map(|object| {
                    object
                        .iter()
                        .map(|(key, value)| (key.clone(), cell_text(value)))
                        .collect()
                })
                .unwrap_or_default();
            (i + 1, raw)
        })
        .collect())
}
