use std::net::SocketAddr;
use std::time::Duration;

use crate::{router::create_router, state::AppState};

/// Run the API server. When snapshot sync is configured and `poll_interval`
/// is non-zero, a background task polls the provider on that interval.
pub async fn run_server(state: AppState, addr: &str, poll_interval: Duration) -> anyhow::Result<()> {
    if let (Some(sync), false) = (state.sync.clone(), poll_interval.is_zero()) {
        let store = state.store.clone();
        let hook = state.clone();
        tokio::spawn(sync.run_periodic(poll_interval, store, move |status| {
            let hook = hook.clone();
            async move {
                if let Err(err) = hook.after_sync(&status).await {
                    tracing::error!(error = %format!("{:#}", err), "failed to persist synced ledger");
                }
            }
        }));
        tracing::info!(every_secs = poll_interval.as_secs(), "snapshot polling started");
    }

    let app = create_router(state);

    let addr = addr.parse::<SocketAddr>()?;
    tracing::info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
