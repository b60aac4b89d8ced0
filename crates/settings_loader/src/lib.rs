//! # Settings Loader
//!
//! Centralized settings loading for the trading ledger. Configuration lives in
//! `settings.json`; any field may be omitted and falls back to its default.
//! A handful of fields can be overridden from the environment (a `.env` file is
//! honoured):
//!
//! | Variable | Field |
//! |---|---|
//! | `LEDGER_DATABASE_PATH` | `database_path` |
//! | `LEDGER_SNAPSHOT_URL` | `snapshot_url` |
//! | `LEDGER_DISPLAY_CURRENCY` | `display_currency` |
//! | `LEDGER_POLL_INTERVAL_SECS` | `poll_interval_secs` |
//!
//! ```rust,no_run
//! let settings = settings_loader::load_effective_settings(None)?;
//! println!("database at {}", settings.database_path);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use models::Settings;

pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads the file at `path` (or the default location). A missing file yields
/// defaults; a malformed one is an error.
pub fn load_settings_with_fallback(path: Option<&Path>) -> Result<Settings> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));
    if settings_file_exists(path) {
        load_settings(path)
    } else {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        Ok(Settings::default())
    }
}

/// File settings with `.env` and environment overrides applied.
pub fn load_effective_settings(path: Option<&Path>) -> Result<Settings> {
    dotenvy::dotenv().ok();
    let settings = load_settings_with_fallback(path)?;
    apply_overrides(settings, |name| std::env::var(name).ok())
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_overrides<F>(mut settings: Settings, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("LEDGER_DATABASE_PATH") {
        settings.database_path = v;
    }
    if let Some(v) = get("LEDGER_SNAPSHOT_URL") {
        settings.snapshot_url = Some(v);
    }
    if let Some(v) = get("LEDGER_DISPLAY_CURRENCY") {
        settings.display_currency = v.trim().to_uppercase();
    }
    if let Some(v) = get("LEDGER_POLL_INTERVAL_SECS") {
        settings.poll_interval_secs = v
            .trim()
            .parse()
            .with_context(|| format!("LEDGER_POLL_INTERVAL_SECS is not a number: {v}"))?;
    }
    Ok(settings)
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let s = load_settings_with_fallback(Some(Path::new("does/not/exist.json"))).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn file_values_are_read() {
        let path = std::env::temp_dir().join(format!("ledger-settings-{}.json", std::process::id()));
        fs::write(&path, r#"{"display_currency":"EUR","poll_interval_secs":60}"#).unwrap();
        let s = load_settings_with_fallback(Some(path.as_path())).unwrap();
        assert_eq!(s.display_currency, "EUR");
        assert_eq!(s.poll_interval_secs, 60);
        assert_eq!(s.database_path, "database/ledger.json");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("ledger-settings-bad-{}.json", std::process::id()));
        fs::write(&path, "{not json").unwrap();
        assert!(load_settings_with_fallback(Some(path.as_path())).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn environment_overrides_file() {
        let vars = env(&[
            ("LEDGER_DATABASE_PATH", "/tmp/l.json"),
            ("LEDGER_SNAPSHOT_URL", "https://example.org/pnl.json"),
            ("LEDGER_DISPLAY_CURRENCY", "eur"),
            ("LEDGER_POLL_INTERVAL_SECS", "45"),
        ]);
        let s = apply_overrides(Settings::default(), |n| vars.get(n).cloned()).unwrap();
        assert_eq!(s.database_path, "/tmp/l.json");
        assert_eq!(s.snapshot_url.as_deref(), Some("https://example.org/pnl.json"));
        assert_eq!(s.display_currency, "EUR");
        assert_eq!(s.poll_interval_secs, 45);
    }

    #[test]
    fn bad_interval_is_rejected_and_blank_values_ignored() {
        let bad = env(&[("LEDGER_POLL_INTERVAL_SECS", "soon")]);
        assert!(apply_overrides(Settings::default(), |n| bad.get(n).cloned()).is_err());
        let blank = env(&[("LEDGER_DATABASE_PATH", "  ")]);
        let s = apply_overrides(Settings::default(), |n| blank.get(n).cloned()).unwrap();
        assert_eq!(s.database_path, Settings::default().database_path);
    }
}
