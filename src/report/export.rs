// src/report/export.rs

use rust_xlsxwriter::{Format, Workbook};
use std::{fs::File, io::BufWriter, path::Path};
use tracing::{info, warn};

use super::ResultTable;
use crate::error::ExportError;

/// Report column order.
pub const COLUMNS: [&str; 5] = ["SCI", "Master BL", "Carrier", "ETA", "Raw Info"];

/// Excel refuses longer strings in a single cell.
const XLSX_MAX_CELL_CHARS: usize = 32_767;

/// Column widths for the xlsx report, in characters.
const XLSX_COLUMN_WIDTHS: [f64; 5] = [14.0, 20.0, 9.0, 32.0, 60.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Xlsx,
    Csv,
}

fn format_for(path: &Path) -> Result<ReportFormat, ExportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => Ok(ReportFormat::Xlsx),
        "csv" => Ok(ReportFormat::Csv),
        other => Err(ExportError::UnsupportedFormat(other.to_string())),
    }
}

/// Write `table` to `path` (xlsx or csv, by extension).
///
/// The report is written to a temporary file next to `path` and renamed over
/// it once complete, so an interrupted export leaves any previous report intact.
#[tracing::instrument(level = "info", skip(table, path), fields(path = %path.as_ref().display(), rows = table.len()))]
pub fn export<P: AsRef<Path>>(table: &ResultTable, path: P) -> Result<(), ExportError> {
    let path = path.as_ref();
    let format = format_for(path)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let suffix = match format {
        ReportFormat::Xlsx => ".xlsx",
        ReportFormat::Csv => ".csv",
    };
    let tmp = tempfile::Builder::new()
        .prefix(".etatrack-")
        .suffix(suffix)
        .tempfile_in(dir)?;

    match format {
        ReportFormat::Xlsx => write_xlsx(table, tmp.path())?,
        ReportFormat::Csv => write_csv(table, tmp.as_file())?,
    }

    tmp.persist(path)?;
    info!("report written");
    Ok(())
}

fn write_xlsx(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("ETA Results")?;

    let bold = Format::new().set_bold();
    for (col, title) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
        sheet.set_column_width(col as u16, XLSX_COLUMN_WIDTHS[col])?;
    }

    for (i, result) in table.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in result.cells().iter().enumerate() {
            sheet.write_string(row, col as u16, clamp_cell(value, row))?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn clamp_cell(value: &str, row: u32) -> &str {
    match value.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(row, "cell longer than {} chars truncated", XLSX_MAX_CELL_CHARS);
            &value[..cut]
        }
        None => value,
    }
}

fn write_csv(table: &ResultTable, file: &File) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(BufWriter::new(file));
    wtr.write_record(COLUMNS)?;
    for result in table {
        wtr.write_record(result.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::Lookup;
    use crate::sheet::ShipmentRecord;
    use anyhow::Result;
    use calamine::{open_workbook_auto, Reader};
    use tempfile::tempdir;

    fn sample() -> ResultTable {
        let mut table = ResultTable::default();
        let rec = |sci: &str, bl: &str, carrier: &str| ShipmentRecord {
            row: 3,
            carrier: carrier.into(),
            master_bl: bl.into(),
            sci: sci.into(),
        };
        table.push(
            &rec("SCI001", "ONEYXXXX1234567", "ONE"),
            &Lookup::Fetched("Status: In Transit\nETA: 2025-05-01".into()),
        );
        table.push(&rec("00042", "X", "MSK"), &Lookup::Unsupported);
        table
    }

    #[test]
    fn test_export_xlsx_keeps_text_cells() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ETA_Results.xlsx");
        export(&sample(), &path)?;

        let mut wb = open_workbook_auto(&path)?;
        let range = wb.worksheet_range("ETA Results")?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();

        assert_eq!(rows[0], COLUMNS.to_vec());
        assert_eq!(rows[1][3], "ETA: 2025-05-01");
        assert_eq!(rows[1][4], "Status: In Transit\nETA: 2025-05-01");
        // leading zeros survive because every cell is a string
        assert_eq!(rows[2][0], "00042");
        assert_eq!(rows[2][3], "Unsupported carrier");
        Ok(())
    }

    #[test]
    fn test_export_csv_header_even_when_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        export(&ResultTable::default(), &path)?;

        let text = std::fs::read_to_string(&path)?;
        assert_eq!(text, "SCI,Master BL,Carrier,ETA,Raw Info\n");
        Ok(())
    }

    #[test]
    fn test_export_csv_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        export(&sample(), &path)?;

        let mut rdr = csv::Reader::from_path(&path)?;
        let records: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1][4], "Only ONE Line supported in this version");
        Ok(())
    }

    #[test]
    fn test_export_rejects_unknown_format_without_leftovers() -> Result<()> {
        let dir = tempdir()?;
        let err = export(&sample(), dir.path().join("out.pdf")).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(ref ext) if ext == "pdf"));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_clamp_cell() {
        let long = "é".repeat(XLSX_MAX_CELL_CHARS + 10);
        assert_eq!(clamp_cell(&long, 1).chars().count(), XLSX_MAX_CELL_CHARS);
        assert_eq!(clamp_cell("short", 1), "short");
    }
}
