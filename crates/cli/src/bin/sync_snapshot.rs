use anyhow::{Result, anyhow};
use clap::Parser;
use cli::{Ledger, LedgerArgs};
use logger::RunRecord;
use serde_json::json;
use snapshot_sync::{SnapshotSync, SyncStatus, http_sync};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use utils::LedgerStore;

#[derive(Parser, Debug)]
#[command(name = "sync-snapshot", about = "Pull the remote ledger snapshot into the local ledger.")]
struct Args {
    /// Keep polling on the configured interval until interrupted
    #[arg(long)]
    watch: bool,

    /// Snapshot URL; overrides settings
    #[arg(long)]
    url: Option<String>,

    /// Polling interval in seconds; overrides settings
    #[arg(long)]
    interval: Option<u64>,

    #[command(flatten)]
    ledger: LedgerArgs,
}

/// Prints, journals and persists one cycle's outcome.
async fn handle(status: SyncStatus, ledger: &Mutex<Ledger>, store: &RwLock<LedgerStore>, sync: &SnapshotSync) -> Result<()> {
    let mut ledger = ledger.lock().await;
    match &status {
        SyncStatus::Synced { report, cursor } => {
            println!(
                "synced: {} rows, {} added, {} replaced, cursor {}",
                report.rows_read,
                report.merge.added,
                report.merge.skipped,
                cursor.as_deref().unwrap_or("-")
            );
            ledger.db.sync_cursor = sync.cursor().await;
            let snapshot = store.read().await;
            ledger.save_store(&snapshot)?;
            ledger
                .journal
                .record(RunRecord::new("sync", "remote_snapshot", true, serde_json::to_value(report)?));
        }
        SyncStatus::Offline { reason } => {
            println!("offline: {} (ledger unchanged)", reason);
            ledger
                .journal
                .record(RunRecord::new("sync", "remote_snapshot", false, json!({ "reason": reason })));
        }
        SyncStatus::AlreadyRunning => println!("previous cycle still running, skipped"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let ledger = args.ledger.open()?;

    let url = args.url.clone().or_else(|| ledger.settings.snapshot_url.clone());
    let timeout = Duration::from_secs(ledger.settings.http_timeout_secs);
    let sync = Arc::new(http_sync(url.as_deref(), timeout)?.with_cursor(ledger.db.sync_cursor.clone()));
    let store = Arc::new(RwLock::new(ledger.store()));
    let period = Duration::from_secs(args.interval.unwrap_or(ledger.settings.poll_interval_secs));
    let ledger = Arc::new(Mutex::new(ledger));

    if !args.watch {
        let status = sync.run_cycle(&store).await;
        let offline = matches!(status, SyncStatus::Offline { .. });
        handle(status, &ledger, &store, &sync).await?;
        return if offline {
            Err(anyhow!("snapshot source unreachable"))
        } else {
            Ok(())
        };
    }

    if period.is_zero() {
        return Err(anyhow!("polling interval must be at least one second"));
    }
    println!("Polling every {}s, Ctrl-C to stop.", period.as_secs());

    let poll = {
        let (ledger, store, hook) = (ledger.clone(), store.clone(), sync.clone());
        sync.clone().run_periodic(period, store.clone(), move |status| {
            let (ledger, store, hook) = (ledger.clone(), store.clone(), hook.clone());
            async move {
                if let Err(err) = handle(status, &ledger, &store, &hook).await {
                    tracing::error!(error = %format!("{:#}", err), "failed to persist sync cycle");
                }
            }
        })
    };

    tokio::select! {
        _ = poll => {}
        _ = tokio::signal::ctrl_c() => println!("stopping"),
    }
    Ok(())
}
