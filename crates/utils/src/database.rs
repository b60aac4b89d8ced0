use anyhow::{Context, Result};
use models::{BaselineConfig, CanonicalLedgerEntry, FxQuote};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::ledger::LedgerStore;

pub const ENGINE_VERSION: &str = "1";

/// Everything the ledger keeps on disk: the keyed entry table plus a small
/// key-value area for baselines, the FX cache and the sync cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerDatabase {
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    #[serde(default)]
    pub entries: Vec<CanonicalLedgerEntry>,
    #[serde(default)]
    pub deposit_baselines: BaselineConfig,
    #[serde(default)]
    pub fx_cache: Option<FxQuote>,
    #[serde(default)]
    pub sync_cursor: Option<String>,
}

fn default_engine_version() -> String {
    ENGINE_VERSION.to_string()
}

impl Default for LedgerDatabase {
    fn default() -> Self {
        Self {
            engine_version: default_engine_version(),
            entries: Vec::new(),
            deposit_baselines: BaselineConfig::default(),
            fx_cache: None,
            sync_cursor: None,
        }
    }
}

impl LedgerDatabase {
    pub fn store(&self) -> LedgerStore {
        LedgerStore::from_entries(self.entries.clone())
    }

    /// Replaces the persisted entries with the store contents, sorted by time
    /// then key so the file diffs cleanly between runs.
    pub fn replace_entries(&mut self, store: &LedgerStore) {
        let mut entries = store.entries().to_vec();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
        self.entries = entries;
    }
}

/// Resolves a directory to `ledger.json` inside it; file paths pass through.
pub fn resolve_database_path<P: AsRef<Path>>(database_path: P) -> PathBuf {
    let path = database_path.as_ref();
    if path.is_dir() || (!path.exists() && !path.to_string_lossy().ends_with(".json")) {
        path.join("ledger.json")
    } else {
        path.to_path_buf()
    }
}

/// Ensures the database file exists, creating an empty one on first use.
pub fn ensure_database_exists<P: AsRef<Path>>(database_path: P) -> Result<PathBuf> {
    let db_path = resolve_database_path(database_path);
    if !db_path.exists() {
        write_database(&db_path, &LedgerDatabase::default())?;
        tracing::info!(path = %db_path.display(), "initialized empty ledger database");
    }
    Ok(db_path)
}

pub fn read_database<P: AsRef<Path>>(database_path: P) -> Result<LedgerDatabase> {
    let db_path = ensure_database_exists(database_path)?;
    let contents = fs::read_to_string(&db_path)
        .with_context(|| format!("Cannot open database at {:?}", db_path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Database at {:?} is not valid JSON", db_path))
}

/// Writes the database through a temp file and a rename, so readers never see
/// a half-written document.
pub fn write_database<P: AsRef<Path>>(database_path: P, db: &LedgerDatabase) -> Result<PathBuf> {
    let db_path = resolve_database_path(database_path);
    let dir = match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("Cannot create directory {:?}", dir))?;

    // One staging file per writer, in the same directory as the target.
    let formatted = serde_json::to_string_pretty(db)?;
    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Cannot create temp database file in {:?}", dir))?;
    tmp.write_all(formatted.as_bytes())
        .with_context(|| format!("Cannot write temp database file at {:?}", tmp.path()))?;
    tmp.persist(&db_path)
        .with_context(|| format!("Cannot move temp database file into place at {:?}", db_path))?;

    Ok(db_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use models::{Exchange, LedgerDraft, MarketType};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ledger-db-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn path_resolution() {
        let dir = temp_dir("resolve");
        assert_eq!(resolve_database_path(&dir), dir.join("ledger.json"));
        assert_eq!(resolve_database_path(dir.join("x.json")), dir.join("x.json"));
    }

    #[test]
    fn first_read_creates_empty_database() {
        let dir = temp_dir("create");
        let db = read_database(&dir).unwrap();
        assert_eq!(db.engine_version, ENGINE_VERSION);
        assert!(db.entries.is_empty());
        assert!(dir.join("ledger.json").exists());
    }

    #[test]
    fn write_then_read_keeps_state() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("ledger.json");
        let ts = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let entry = LedgerDraft::derived(ts, Exchange::Kraken, MarketType::Spot, "XBTUSD", "BUY", 0.0, 1.0, 0.0)
            .into_entry("KRAKEN|T1".into());

        let mut db = LedgerDatabase::default();
        db.replace_entries(&LedgerStore::from_entries(vec![entry]));
        db.deposit_baselines.set("all", 1500.0);
        db.sync_cursor = Some("2024-02-01T00:00:00Z".into());
        write_database(&path, &db).unwrap();

        let back = read_database(&path).unwrap();
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.entries[0].key, "KRAKEN|T1");
        assert_eq!(back.deposit_baselines.all, Some(1500.0));
        assert_eq!(back.sync_cursor.as_deref(), Some("2024-02-01T00:00:00Z"));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
        assert_eq!(back.store().len(), 1);
    }

    #[test]
    fn concurrent_writes_all_succeed() {
        let dir = temp_dir("concurrent");
        let path = dir.join("ledger.json");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut db = LedgerDatabase::default();
                    db.sync_cursor = Some(format!("cursor-{i}"));
                    (0..25).filter(|_| write_database(&path, &db).is_err()).count()
                })
            })
            .collect();
        let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let back = read_database(&path).unwrap();
        assert!(back.sync_cursor.unwrap().starts_with("cursor-"));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }
}
