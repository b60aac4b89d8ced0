//! Logging bootstrap and the append-only run journal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over
/// `default_filter`. Calling it twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub at: DateTime<Utc>,
    /// `import`, `sync`, `reset`, ...
    pub kind: String,
    pub source: String,
    pub ok: bool,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl RunRecord {
    pub fn new(kind: &str, source: &str, ok: bool, details: serde_json::Value) -> Self {
        Self {
            at: Utc::now(),
            kind: kind.to_string(),
            source: source.to_string(),
            ok,
            details,
        }
    }
}

/// JSON-lines file recording every ingestion and sync run.
#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
}

impl RunJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Creating journal directory {}", parent.display()))?;
            }
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Opening run journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Writing run journal {}", self.path.display()))?;
        Ok(())
    }

    /// Appends, logging instead of failing. The journal never blocks a run.
    pub fn record(&self, record: RunRecord) {
        if let Err(err) = self.append(&record) {
            tracing::warn!(error = %err, kind = %record.kind, "could not write run journal");
        }
    }

    /// Reads back every record; unreadable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Reading run journal {}", self.path.display()))?;
        Ok(raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}
