use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use data_import::{prepare_snapshot, IngestReport};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use utils::LedgerStore;

/// Read-only source of ledger snapshots.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the raw JSON document. `cursor` is the `generated_at` of the
    /// last snapshot that was applied.
    async fn fetch(&self, cursor: Option<&str>) -> Result<String>;
}

/// `GET url[?since=cursor]`
pub struct HttpSnapshotProvider {
    http: Client,
    url: String,
}

impl HttpSnapshotProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("trading-ledger/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<String> {
        let mut req = self.http.get(&self.url);
        if let Some(c) = cursor {
            req = req.query(&[("since", c)]);
        }
        let url = &self.url;
        req.send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned non-success status"))?
            .text()
            .await
            .with_context(|| format!("Failed to read snapshot body from {url}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Synced {
        report: IngestReport,
        cursor: Option<String>,
    },
    /// Fetch or decode failed; the ledger keeps its last synced state.
    Offline { reason: String },
    /// A cycle was already in flight; nothing was done.
    AlreadyRunning,
}

/// Polls a snapshot provider and folds each snapshot into the ledger.
pub struct SnapshotSync {
    provider: Box<dyn SnapshotProvider>,
    timeout: Duration,
    in_flight: AtomicBool,
    cursor: Mutex<Option<String>>,
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SnapshotSync {
    pub fn new(provider: Box<dyn SnapshotProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            in_flight: AtomicBool::new(false),
            cursor: Mutex::new(None),
        }
    }

    pub fn with_cursor(self, cursor: Option<String>) -> Self {
        Self {
            cursor: Mutex::new(cursor),
            ..self
        }
    }

    pub async fn cursor(&self) -> Option<String> {
        self.cursor.lock().await.clone()
    }

    /// Forgets the cursor so the next cycle asks for a full snapshot.
    pub async fn reset_cursor(&self) {
        *self.cursor.lock().await = None;
    }

    fn begin(&self) -> Option<CycleGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(&self.in_flight))
    }

    /// Runs one fetch-normalize-upsert cycle.
    ///
    /// The fetch runs without holding the store lock. The upsert completes
    /// under the write lock before this returns, so any read issued afterwards
    /// sees it.
    pub async fn run_cycle(&self, store: &RwLock<LedgerStore>) -> SyncStatus {
        let Some(_guard) = self.begin() else {
            tracing::debug!("snapshot sync already in flight, skipping");
            return SyncStatus::AlreadyRunning;
        };

        let cursor = self.cursor().await;
        let body = match tokio::time::timeout(self.timeout, self.provider.fetch(cursor.as_deref())).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return offline(format!("{}: {:#}", self.provider.name(), e)),
            Err(_) => {
                return offline(format!(
                    "{}: no response within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            }
        };

        let batch = match prepare_snapshot(&body) {
            Ok(batch) => batch,
            Err(e) => return offline(format!("invalid snapshot: {}", e)),
        };

        let report = {
            let mut guard = store.write().await;
            batch.commit(&mut guard)
        };

        let mut saved = self.cursor.lock().await;
        if report.cursor.is_some() {
            *saved = report.cursor.clone();
        }
        SyncStatus::Synced {
            cursor: saved.clone(),
            report,
        }
    }

    /// Runs a cycle every `period` until the task is dropped. Ticks missed
    /// while a slow cycle runs are skipped rather than queued.
    pub async fn run_periodic<F, Fut>(self: Arc<Self>, period: Duration, store: Arc<RwLock<LedgerStore>>, mut on_cycle: F)
    where
        F: FnMut(SyncStatus) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let status = self.run_cycle(&store).await;
            on_cycle(status).await;
        }
    }
}

fn offline(reason: String) -> SyncStatus {
    tracing::warn!(%reason, "snapshot sync offline");
    SyncStatus::Offline { reason }
}

/// Builds the HTTP-backed sync from a configured URL.
pub fn http_sync(url: Option<&str>, timeout: Duration) -> Result<SnapshotSync> {
    let url = url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow!("No snapshot URL configured"))?;
    Ok(SnapshotSync::new(
        Box::new(HttpSnapshotProvider::new(url, timeout)?),
        timeout,
    ))
}
