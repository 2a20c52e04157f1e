//! Bulk chip import.
//!
//! This module provides:
//! - Row normalization through a static alias table
//! - Row sources for spreadsheet uploads (CSV, XLSX, XLS) and JSON payloads
//! - The transactional importer and its outcome types

mod importer;
mod normalize;
mod outcome;
mod source;

// Re-export public API
pub use importer::{BulkImporter, ImportSettings};
pub use normalize::{
    map_category, map_operator, map_status, normalize, Category, ChipStatus, Field, ImportRow,
    Operator, RawRow, FIELD_ALIASES,
};
pub use outcome::{ImportOutcome, RowError, RowOutcome};
pub use source::{rows_from_csv, rows_from_json, rows_from_upload, SourceRow, SpreadsheetFormat};
