// src/report/mod.rs
use serde::Serialize;
use std::fmt;

use crate::carrier::Lookup;
use crate::sheet::ShipmentRecord;

pub mod export;

pub use export::{export, COLUMNS};

/// One output row, in report column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    #[serde(rename = "SCI")]
    pub sci: String,
    #[serde(rename = "Master BL")]
    pub master_bl: String,
    #[serde(rename = "Carrier")]
    pub carrier: String,
    #[serde(rename = "ETA")]
    pub eta: String,
    #[serde(rename = "Raw Info")]
    pub raw_info: String,
}

impl LookupResult {
    pub fn new(record: &ShipmentRecord, lookup: &Lookup) -> Self {
        Self {
            sci: record.sci.clone(),
            master_bl: record.master_bl.clone(),
            carrier: record.carrier_code(),
            eta: lookup.eta(),
            raw_info: lookup.raw_info(),
        }
    }

    pub fn cells(&self) -> [&str; 5] {
        [
            self.sci.as_str(),
            self.master_bl.as_str(),
            self.carrier.as_str(),
            self.eta.as_str(),
            self.raw_info.as_str(),
        ]
    }
}

/// Results of one run, in input order. No sorting, grouping or dedup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<LookupResult>,
}

impl ResultTable {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            rows: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, record: &ShipmentRecord, lookup: &Lookup) {
        self.rows.push(LookupResult::new(record, lookup));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LookupResult> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[LookupResult] {
        &self.rows
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a LookupResult;
    type IntoIter = std::slice::Iter<'a, LookupResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Widest a cell may print in the terminal table.
const MAX_CELL_WIDTH: usize = 48;

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Vec<&str>> = self.rows.iter().map(|r| r.cells().to_vec()).collect();
        f.write_str(&render_table(&COLUMNS, &rows))
    }
}

/// Plain-text table with padded columns. Newlines inside a cell print as ` | `.
pub fn render_table<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> String {
    let flatten = |s: &str| -> String {
        let flat = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        if flat.chars().count() > MAX_CELL_WIDTH {
            let mut cut: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
            cut.push('…');
            cut
        } else {
            flat
        }
    };

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| flatten(c.as_ref())).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&pad_line(headers, &widths));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&pad_line(&rule.iter().map(String::as_str).collect::<Vec<_>>(), &widths));
    out.push('\n');
    for row in &body {
        out.push_str(&pad_line(&row.iter().map(String::as_str).collect::<Vec<_>>(), &widths));
        out.push('\n');
    }
    out
}

fn pad_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: usize, carrier: &str, bl: &str, sci: &str) -> ShipmentRecord {
        ShipmentRecord {
            row,
            carrier: carrier.into(),
            master_bl: bl.into(),
            sci: sci.into(),
        }
    }

    #[test]
    fn test_push_preserves_order_and_duplicates() {
        let mut table = ResultTable::default();
        table.push(&record(3, "one", "B1", "S1"), &Lookup::Fetched("ETA: x".into()));
        table.push(&record(4, "MSK", "B2", "S2"), &Lookup::Unsupported);
        table.push(&record(5, "ONE", "B1", "S3"), &Lookup::Failed("boom".into()));

        let scis: Vec<_> = table.iter().map(|r| r.sci.as_str()).collect();
        assert_eq!(scis, vec!["S1", "S2", "S3"]);
        assert_eq!(table.len(), 3);

        let first = &table.rows()[0];
        assert_eq!(first.carrier, "ONE");
        assert_eq!(first.eta, "ETA: x");

        let unsupported = &table.rows()[1];
        assert_eq!(unsupported.eta, "Unsupported carrier");
        assert_eq!(unsupported.raw_info, "Only ONE Line supported in this version");

        let failed = &table.rows()[2];
        assert_eq!(failed.eta, "N/A");
        assert_eq!(failed.raw_info, "Error fetching: boom");
    }

    #[test]
    fn test_json_uses_report_column_names() {
        let mut table = ResultTable::default();
        table.push(&record(3, "ONE", "B1", "S1"), &Lookup::Fetched("ETA: x".into()));
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0]["Master BL"], "B1");
        assert_eq!(json[0]["Raw Info"], "ETA: x");
    }

    #[test]
    fn test_display_flattens_multiline_cells() {
        let mut table = ResultTable::default();
        table.push(
            &record(3, "ONE", "B1", "S1"),
            &Lookup::Fetched("Status: In Transit\nETA: 2025-05-01".into()),
        );
        let text = table.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SCI"));
        assert!(lines[2].contains("Status: In Transit | ETA: 2025-05-01"));
    }

    #[test]
    fn test_render_table_truncates_long_cells() {
        let long = "x".repeat(200);
        let out = render_table(&["A"], &[vec![long.as_str()]]);
        let row = out.lines().nth(2).unwrap();
        assert_eq!(row.chars().count(), MAX_CELL_WIDTH);
        assert!(row.ends_with('…'));
    }
}
