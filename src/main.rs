use anyhow::{Context, Result};
use clap::Parser;
use etatrack::{
    carrier::CarrierRegistry,
    config::Settings,
    pipeline,
    report::{self, render_table, ResultTable},
    sheet::ShipmentRecord,
};
use serde::Serialize;
use std::{
    env,
    io::{self, Write},
    path::PathBuf,
};
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Look up container ETAs for the shipments listed in a spreadsheet"
)]
struct Args {
    /// Shipment sheet (.xlsx, .xls, .xlsm, .ods or .csv)
    input: PathBuf,
    /// Report destination (.xlsx or .csv)
    #[arg(short, long, default_value = "ETA_Results.xlsx")]
    output: PathBuf,
    /// Worksheet name; the first sheet when omitted
    #[arg(long)]
    sheet: Option<String>,
    /// 0-based row holding the column labels
    #[arg(long)]
    header_row: Option<usize>,
    /// YAML settings file
    #[arg(long, env = "ETATRACK_CONFIG")]
    config: Option<PathBuf>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
    /// Validate the sheet and print the records without tracking anything
    #[arg(long)]
    dry_run: bool,
    /// Print results as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(log_level.parse().unwrap_or(Level::INFO.into()))
    });
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(input = %args.input.display(), "startup");

    // ─── 2) settings ─────────────────────────────────────────────────
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(sheet) = args.sheet.clone() {
        settings.sheet = Some(sheet);
    }
    if let Some(row) = args.header_row {
        settings.header_row = row;
    }
    if args.headed {
        settings.browser.headless = false;
    }
    settings.validate().context("invalid settings")?;

    // ─── 3) load & validate the sheet ────────────────────────────────
    let extraction = pipeline::prepare(&args.input, &settings)?;
    let mut stdout = io::stdout();
    if args.dry_run {
        if args.json {
            write_json(&mut stdout, &extraction.records)?;
        } else {
            write_preview(&mut stdout, &extraction.records, false)?;
        }
        info!(records = extraction.records.len(), "dry run; nothing tracked");
        return Ok(());
    }
    write_preview(&mut stdout, &extraction.records, args.json)?;
    if extraction.records.is_empty() {
        warn!("no usable rows; writing an empty report");
    }

    // ─── 4) track ────────────────────────────────────────────────────
    let start = Instant::now();
    let registry = CarrierRegistry::with_defaults(&settings);
    let results = pipeline::track(&extraction.records, &registry).await;

    // ─── 5) print & export ───────────────────────────────────────────
    write_results(&mut stdout, &results, args.json)?;

    report::export(&results, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        rows = results.len(),
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}

/// Validated records, shown before tracking starts. Skipped in JSON mode,
/// where stdout carries only the final document.
fn write_preview<W: Write>(out: &mut W, records: &[ShipmentRecord], json: bool) -> Result<()> {
    if json {
        return Ok(());
    }
    let rows: Vec<Vec<&str>> = records
        .iter()
        .map(|r| vec![r.sci.as_str(), r.master_bl.as_str(), r.carrier.as_str()])
        .collect();
    writeln!(out, "{}", render_table(&["SCI", "Master BL", "CARRIER"], &rows))?;
    Ok(())
}

fn write_results<W: Write>(out: &mut W, results: &ResultTable, json: bool) -> Result<()> {
    if json {
        write_json(out, results)
    } else {
        writeln!(out, "{}", results)?;
        Ok(())
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
