use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{LedgerArgs, view_filters};
use dashboard_engine::{SortOrder, filtered_view};
use std::{fs, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "export-ledger", about = "Export ledger entries as CSV.")]
struct Args {
    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Time range: all, ytd or <n>d
    #[arg(long, default_value = "all")]
    range: String,

    /// Range anchor: now or latest
    #[arg(long, default_value = "now")]
    anchor: String,

    /// Only this exchange
    #[arg(long)]
    exchange: Option<String>,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let ledger = args.ledger.open()?;
    let filters = view_filters(&args.range, &args.anchor, args.exchange.as_deref(), None, None)?;

    let entries = filtered_view(&ledger.db.entries, &filters, Utc::now(), SortOrder::Ascending);
    let csv = utils::export_csv(&entries)?;

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Exported {} entries to {}", entries.len(), path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
