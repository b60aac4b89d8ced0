use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use utils::LedgerDatabase;

/// Durable home of the ledger database.
/// File-backed in production; the in-memory variant backs tests and dry runs.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn load(&self) -> anyhow::Result<LedgerDatabase>;
    async fn save(&self, db: &LedgerDatabase) -> anyhow::Result<()>;
}

/// JSON file on disk, written atomically through `utils::write_database`.
pub struct FileLedgerRepository {
    database_path: PathBuf,
}

impl FileLedgerRepository {
    pub fn new<P: AsRef<Path>>(database_path: P) -> Self {
        Self {
            database_path: database_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }
}

#[async_trait]
impl LedgerRepository for FileLedgerRepository {
    async fn load(&self) -> anyhow::Result<LedgerDatabase> {
        let path = self.database_path.clone();
        tokio::task::spawn_blocking(move || {
            utils::ensure_database_exists(&path)?;
            utils::read_database(&path)
        })
        .await
        .context("database read task failed")?
    }

    async fn save(&self, db: &LedgerDatabase) -> anyhow::Result<()> {
        let path = self.database_path.clone();
        let db = db.clone();
        tokio::task::spawn_blocking(move || utils::write_database(&path, &db).map(|_| ()))
            .await
            .context("database write task failed")?
    }
}

#[derive(Default)]
pub struct MemoryLedgerRepository {
    db: RwLock<LedgerDatabase>,
}

impl MemoryLedgerRepository {
    pub fn new(db: LedgerDatabase) -> Self {
        Self { db: RwLock::new(db) }
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn load(&self) -> anyhow::Result<LedgerDatabase> {
        Ok(self.db.read().await.clone())
    }

    async fn save(&self, db: &LedgerDatabase) -> anyhow::Result<()> {
        *self.db.write().await = db.clone();
        Ok(())
    }
}
