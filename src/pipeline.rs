// src/pipeline.rs

use anyhow::Result;
use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::carrier::{CarrierRegistry, Lookup};
use crate::config::Settings;
use crate::error::MissingColumnsError;
use crate::report::ResultTable;
use crate::sheet::{self, extract_records, Extraction, HeaderMap, RawTable, ShipmentRecord};

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub results: ResultTable,
    /// 1-based sheet rows left out for a blank carrier, B/L or SCI.
    pub dropped: Vec<usize>,
}

/// Normalize the header row and pull out the shipment records.
pub fn load_records(table: &RawTable) -> Result<Extraction, MissingColumnsError> {
    let headers = HeaderMap::normalize(&table.headers);
    debug!(labels = ?headers.labels(), "normalized headers");

    let extraction = extract_records(&headers, table)?;
    if !extraction.dropped.is_empty() {
        warn!(
            count = extraction.dropped.len(),
            rows = ?extraction.dropped,
            "skipping rows with a blank carrier, master B/L or SCI"
        );
    }
    info!(records = extraction.records.len(), "records ready");
    Ok(extraction)
}

/// Read `path` and extract records, without contacting any carrier.
pub fn prepare<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<Extraction> {
    let table = sheet::load(path, &settings.load_options())?;
    let extraction = load_records(&table)?;
    Ok(extraction)
}

/// Look up every record, one at a time, in input order.
pub async fn track(records: &[ShipmentRecord], registry: &CarrierRegistry) -> ResultTable {
    let total = records.len();
    let started = Instant::now();
    let mut results = ResultTable::with_capacity(total);
    let mut failed = 0usize;

    for (i, record) in records.iter().enumerate() {
        info!(
            progress = %format!("{}/{}", i + 1, total),
            row = record.row,
            sci = %record.sci,
            carrier = %record.carrier_code(),
            master_bl = %record.master_bl,
            "tracking"
        );

        let lookup = registry.dispatch(&record.carrier, &record.master_bl).await;
        match &lookup {
            Lookup::Failed(reason) => {
                failed += 1;
                warn!(row = record.row, %reason, "lookup failed; continuing");
            }
            Lookup::Unsupported => debug!(row = record.row, "unsupported carrier"),
            Lookup::Fetched(_) => {}
        }
        results.push(record, &lookup);
    }

    info!(
        total,
        failed,
        elapsed = ?started.elapsed(),
        "tracking complete"
    );
    results
}

/// Load, extract and track in one go.
pub async fn run<P: AsRef<Path>>(
    path: P,
    settings: &Settings,
    registry: &CarrierRegistry,
) -> Result<RunReport> {
    let extraction = prepare(path, settings)?;
    let results = track(&extraction.records, registry).await;
    Ok(RunReport {
        results,
        dropped: extraction.dropped,
    })
}
