use anyhow::Context;
use backend_api::{run_server, AppState, FileLedgerRepository, LedgerRepository};
use logger::RunJournal;
use snapshot_sync::http_sync;
use std::{env, path::PathBuf, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = env::var("SETTINGS_PATH").ok().map(PathBuf::from);
    let settings = settings_loader::load_effective_settings(settings_path.as_deref())?;
    logger::init_tracing(&format!("{},tower_http=info", settings.log_filter));

    let addr = env::var("LEDGER_SERVER_ADDR").unwrap_or_else(|_| settings.server_addr.clone());
    let timeout = Duration::from_secs(settings.http_timeout_secs);

    let repo = Arc::new(FileLedgerRepository::new(&settings.database_path));
    let db = repo.load().await.context("load ledger database")?;

    let fx = fx_rates::service_from_settings(&settings)?;

    let sync = match settings.snapshot_url.as_deref() {
        Some(url) => Some(http_sync(Some(url), timeout)?),
        None => {
            tracing::info!("no snapshot URL configured, remote sync disabled");
            None
        }
    };

    tracing::info!(
        database = %repo.path().display(),
        entries = db.entries.len(),
        display_currency = %settings.display_currency,
        "trading ledger api starting"
    );

    let state = AppState::from_database(db, repo, fx, sync).with_journal(RunJournal::new(&settings.journal_path));
    run_server(state, &addr, Duration::from_secs(settings.poll_interval_secs)).await
}
