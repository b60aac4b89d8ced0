use anyhow::{Result, anyhow};
use clap::Parser;
use cli::LedgerArgs;
use data_import::ingest_csv_file;
use logger::RunRecord;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "import-ledger", about = "Import exchange CSV exports into the trading ledger.")]
struct Args {
    /// CSV files to import (order history, spot trades or futures account log)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut ledger = args.ledger.open()?;
    let mut store = ledger.store();

    let mut failed = 0;
    let mut added = 0;
    for file in &args.files {
        let source = file.display().to_string();
        match ingest_csv_file(&mut store, file) {
            Ok(report) => {
                println!(
                    "{}: {} rows, {} entries ({} added, {} replaced, {} rejected), {} filtered, {} without timestamp",
                    source,
                    report.rows_read,
                    report.entries,
                    report.merge.added,
                    report.merge.skipped,
                    report.merge.rejected,
                    report.filtered,
                    report.missing_timestamp,
                );
                added += report.merge.added;
                ledger
                    .journal
                    .record(RunRecord::new("import", &source, true, serde_json::to_value(&report)?));
            }
            Err(err) => {
                eprintln!("[ERROR] {}: {}", source, err);
                failed += 1;
                ledger
                    .journal
                    .record(RunRecord::new("import", &source, false, json!({ "error": err.to_string() })));
            }
        }
    }

    ledger.save_store(&store)?;
    println!("Ledger now holds {} entries ({} new).", store.len(), added);

    if failed > 0 {
        Err(anyhow!("{} of {} files could not be imported", failed, args.files.len()))
    } else {
        Ok(())
    }
}
