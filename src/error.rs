// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::sheet::headers::CanonicalField;

/// Problems reading the input spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("unsupported input format `{0}` (expected xlsx, xlsm, xlsb, xls, ods or csv)")]
    UnsupportedFormat(String),

    #[error("failed to open workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("workbook {0:?} contains no sheets")]
    NoSheets(PathBuf),

    #[error("sheet `{0}` not found")]
    SheetNotFound(String),

    #[error("header row {row} is beyond the last row of the sheet ({rows} rows)")]
    HeaderRowOutOfRange { row: usize, rows: usize },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Required canonical columns that no header mapped onto.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required columns: {}", join_fields(.missing))]
pub struct MissingColumnsError {
    pub missing: Vec<CanonicalField>,
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Problems writing the result report.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported report format `{0}` (expected xlsx or csv)")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
