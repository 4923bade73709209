// src/sheet/records.rs

use serde::Serialize;

use super::headers::{CanonicalField, HeaderMap};
use super::RawTable;
use crate::error::MissingColumnsError;

/// One shipment to look up, fields trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentRecord {
    /// 1-based sheet row the record was read from.
    pub row: usize,
    pub carrier: String,
    pub master_bl: String,
    pub sci: String,
}

impl ShipmentRecord {
    /// Carrier code as the registry keys it.
    pub fn carrier_code(&self) -> String {
        self.carrier.trim().to_uppercase()
    }
}

/// Records that survived validation, plus the sheet rows that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<ShipmentRecord>,
    /// 1-based sheet rows dropped for a blank carrier, B/L or SCI.
    pub dropped: Vec<usize>,
}

/// Project `table` onto the three canonical columns.
///
/// Fails when a required column is missing. Rows with any of the three values
/// blank are left out; rows that are blank in every cell are skipped without
/// being counted as dropped.
pub fn extract_records(
    headers: &HeaderMap,
    table: &RawTable,
) -> Result<Extraction, MissingColumnsError> {
    let (carrier_col, bl_col, sci_col) = match (
        headers.column_of(CanonicalField::Carrier),
        headers.column_of(CanonicalField::MasterBl),
        headers.column_of(CanonicalField::Sci),
    ) {
        (Some(c), Some(b), Some(s)) => (c, b, s),
        _ => {
            return Err(MissingColumnsError {
                missing: headers.missing(),
            })
        }
    };

    let mut out = Extraction::default();
    for (i, row) in table.rows.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let cell = |col: usize| row.get(col).map(|s| s.trim()).unwrap_or("");
        let (carrier, master_bl, sci) = (cell(carrier_col), cell(bl_col), cell(sci_col));
        if carrier.is_empty() || master_bl.is_empty() || sci.is_empty() {
            out.dropped.push(table.sheet_row(i));
            continue;
        }

        out.records.push(ShipmentRecord {
            row: table.sheet_row(i),
            carrier: carrier.to_string(),
            master_bl: master_bl.to_string(),
            sci: sci.to_string(),
        });
    }

    Ok(out)
}
