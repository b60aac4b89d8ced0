use anyhow::{Result, anyhow};
use clap::Parser;
use cli::LedgerArgs;
use logger::RunRecord;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "reset-ledger",
    about = "Delete every ledger entry and the sync cursor. Baselines and the FX cache are kept."
)]
struct Args {
    /// Confirm the reset
    #[arg(long)]
    yes: bool,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !args.yes {
        return Err(anyhow!("refusing to reset the ledger without --yes"));
    }
    let mut ledger = args.ledger.open()?;
    let removed = ledger.db.entries.len();
    ledger.db.entries.clear();
    ledger.db.sync_cursor = None;
    ledger.save()?;
    ledger
        .journal
        .record(RunRecord::new("reset", "cli", true, json!({ "removed": removed })));
    println!("Removed {} entries from {}", removed, ledger.path.display());
    Ok(())
}
