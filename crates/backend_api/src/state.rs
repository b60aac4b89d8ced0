use fx_rates::FxService;
use logger::{RunJournal, RunRecord};
use models::BaselineConfig;
use snapshot_sync::{SnapshotSync, SyncStatus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use utils::{LedgerDatabase, LedgerStore};

use crate::repository::LedgerRepository;

/// Shared server state. The store is the single source of truth; the
/// repository only mirrors it to disk after each mutation.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<LedgerStore>>,
    pub baselines: Arc<RwLock<BaselineConfig>>,
    pub fx: Arc<FxService>,
    pub sync: Option<Arc<SnapshotSync>>,
    pub repo: Arc<dyn LedgerRepository>,
    pub journal: Option<RunJournal>,
    /// Cursor carried through unchanged when no sync is configured.
    idle_cursor: Arc<RwLock<Option<String>>>,
    /// Held from snapshot to save so writes land on disk in order.
    persist_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Seeds in-memory state from a loaded database.
    pub fn from_database(
        db: LedgerDatabase,
        repo: Arc<dyn LedgerRepository>,
        fx: FxService,
        sync: Option<SnapshotSync>,
    ) -> Self {
        let idle_cursor = if sync.is_some() { None } else { db.sync_cursor.clone() };
        let sync = sync.map(|s| Arc::new(s.with_cursor(db.sync_cursor.clone())));
        Self {
            store: Arc::new(RwLock::new(db.store())),
            baselines: Arc::new(RwLock::new(db.deposit_baselines)),
            fx: Arc::new(fx.with_cached(db.fx_cache)),
            sync,
            repo,
            journal: None,
            idle_cursor: Arc::new(RwLock::new(idle_cursor)),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Current state as a database document.
    pub async fn snapshot(&self) -> LedgerDatabase {
        let mut db = LedgerDatabase::default();
        db.replace_entries(&*self.store.read().await);
        db.deposit_baselines = self.baselines.read().await.clone();
        db.fx_cache = self.fx.cached().await;
        db.sync_cursor = match &self.sync {
            Some(sync) => sync.cursor().await,
            None => self.idle_cursor.read().await.clone(),
        };
        db
    }

    /// Forgets the sync cursor so the next cycle fetches the full snapshot.
    pub async fn reset_cursor(&self) {
        match &self.sync {
            Some(sync) => sync.reset_cursor().await,
            None => *self.idle_cursor.write().await = None,
        }
    }

    pub async fn persist(&self) -> anyhow::Result<()> {
        let _guard = self.persist_lock.lock().await;
        let db = self.snapshot().await;
        self.repo.save(&db).await?;
        tracing::debug!(entries = db.entries.len(), "ledger persisted");
        Ok(())
    }

    pub fn record(&self, record: RunRecord) {
        if let Some(journal) = &self.journal {
            journal.record(record);
        }
    }

    /// Journals a sync cycle and persists it when it changed anything.
    pub async fn after_sync(&self, status: &SyncStatus) -> anyhow::Result<()> {
        match status {
            SyncStatus::Synced { report, .. } => {
                self.record(RunRecord::new("sync", "remote_snapshot", true, serde_json::to_value(report)?));
                self.persist().await
            }
            SyncStatus::Offline { reason } => {
                self.record(RunRecord::new("sync", "remote_snapshot", false, serde_json::json!({ "reason": reason })));
                Ok(())
            }
            SyncStatus::AlreadyRunning => Ok(()),
        }
    }
}
