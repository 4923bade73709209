// src/sheet/mod.rs
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info};

use crate::error::SheetError;

pub mod headers;
pub mod records;

pub use headers::{CanonicalField, HeaderMap};
pub use records::{extract_records, Extraction, ShipmentRecord};

/// Header labels and the data rows beneath them, every cell as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Labels from the header row. Blank header cells become `Unnamed: <col>`.
    pub headers: Vec<String>,
    /// Rows below the header, each padded to `headers.len()`.
    pub rows: Vec<Vec<String>>,
    /// 0-based sheet row the header was read from.
    pub header_row: usize,
}

impl RawTable {
    /// Split a grid of sheet rows at `header_row`.
    pub fn from_grid(mut grid: Vec<Vec<String>>, header_row: usize) -> Result<Self, SheetError> {
        if header_row >= grid.len() {
            return Err(SheetError::HeaderRowOutOfRange {
                row: header_row,
                rows: grid.len(),
            });
        }

        let rows = grid.split_off(header_row + 1);
        let header_cells = grid.pop().unwrap_or_default();
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0);

        let headers = (0..width)
            .map(|i| match header_cells.get(i).map(|s| s.trim()) {
                Some(label) if !label.is_empty() => header_cells[i].clone(),
                _ => format!("Unnamed: {}", i),
            })
            .collect();

        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            header_row,
        })
    }

    /// 1-based sheet row number of the data row at `index`.
    pub fn sheet_row(&self, index: usize) -> usize {
        self.header_row + index + 2
    }
}

/// Shipment sheets carry a title line above the column labels.
pub const DEFAULT_HEADER_ROW: usize = 1;

/// Where to find the table inside the input file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Worksheet name; the first sheet when `None`. Ignored for CSV.
    pub sheet: Option<String>,
    /// 0-based row holding the column labels.
    pub header_row: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: DEFAULT_HEADER_ROW,
        }
    }
}

/// Read a spreadsheet (xlsx, xlsm, xlsb, xls, ods or csv) into a `RawTable`.
#[tracing::instrument(level = "info", skip(path, options), fields(path = %path.as_ref().display()))]
pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<RawTable> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let grid = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, options.sheet.as_deref())?,
        "csv" => read_csv(path)?,
        other => return Err(SheetError::UnsupportedFormat(other.to_string()).into()),
    };
    debug!(rows = grid.len(), "read sheet grid");

    let table = RawTable::from_grid(grid, options.header_row)
        .with_context(|| format!("reading header row of {}", path.display()))?;
    info!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        "loaded sheet"
    );
    Ok(table)
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(SheetError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| SheetError::NoSheets(path.to_path_buf()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| SheetError::Workbook {
            path: path.to_path_buf(),
            message: format!("reading sheet '{}': {}", name, e),
        })?;

    // the used range may not start at A1; keep absolute sheet coordinates
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: Vec<Vec<String>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col];
        cells.extend(row.iter().map(cell_to_string));
        grid.push(cells);
    }
    Ok(grid)
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>, SheetError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

/// Render a cell as plain text. Empty and error cells become "".
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => ndt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
