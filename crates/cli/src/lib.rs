//! Plumbing shared by the operator binaries: settings, the ledger file and
//! the run journal.

use anyhow::{Context, Result, anyhow};
use clap::Args;
use dashboard_engine::{EngineContext, RangeAnchor, TimeRange, ViewFilters};
use fx_rates::ConversionState;
use logger::RunJournal;
use models::{Exchange, MarketType, Settings};
use std::path::PathBuf;
use utils::{LedgerDatabase, LedgerStore};

#[derive(Args, Debug, Clone, Default)]
pub struct LedgerArgs {
    /// Path to settings.json (missing file means defaults)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Ledger database file; overrides the configured path
    #[arg(long)]
    pub database: Option<PathBuf>,
}

/// An opened ledger database plus the settings it was opened with.
pub struct Ledger {
    pub settings: Settings,
    pub path: PathBuf,
    pub db: LedgerDatabase,
    pub journal: RunJournal,
}

impl LedgerArgs {
    /// Loads settings, starts logging and reads (or creates) the database.
    pub fn open(&self) -> Result<Ledger> {
        let settings = settings_loader::load_effective_settings(self.settings.as_deref())?;
        logger::init_tracing(&settings.log_filter);
        Ledger::open_with(settings, self.database.clone())
    }
}

impl Ledger {
    pub fn open_with(settings: Settings, database: Option<PathBuf>) -> Result<Self> {
        let path = database.unwrap_or_else(|| PathBuf::from(&settings.database_path));
        let db = utils::read_database(&path)
            .with_context(|| format!("opening ledger {}", path.display()))?;
        let journal = RunJournal::new(&settings.journal_path);
        Ok(Self {
            settings,
            path,
            db,
            journal,
        })
    }

    pub fn store(&self) -> LedgerStore {
        self.db.store()
    }

    /// Writes the store back together with the rest of the persisted state.
    pub fn save_store(&mut self, store: &LedgerStore) -> Result<()> {
        self.db.replace_entries(store);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let written = utils::write_database(&self.path, &self.db)?;
        tracing::debug!(path = %written.display(), entries = self.db.entries.len(), "ledger saved");
        Ok(())
    }

    pub fn engine_context(&self) -> EngineContext {
        EngineContext {
            conversion: ConversionState::new(
                &self.settings.base_currency,
                &self.settings.display_currency,
                self.db.fx_cache.clone(),
            ),
            baselines: self.db.deposit_baselines.clone(),
        }
    }
}

/// Builds view filters from command-line strings. `all` or empty means no filter.
pub fn view_filters(
    range: &str,
    anchor: &str,
    exchange: Option<&str>,
    market: Option<&str>,
    search: Option<String>,
) -> Result<ViewFilters> {
    let keep = |s: &&str| !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("all");
    Ok(ViewFilters {
        range: TimeRange::parse(range).ok_or_else(|| anyhow!("unknown range '{range}' (all, ytd, <n>d)"))?,
        anchor: RangeAnchor::parse(anchor).ok_or_else(|| anyhow!("unknown anchor '{anchor}' (now, latest)"))?,
        exchange: exchange.filter(keep).map(Exchange::from_label),
        market_type: market.filter(keep).map(MarketType::from_label),
        search: search.filter(|s| !s.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn filters_from_strings() {
        let f = view_filters("30d", "latest", Some("krakenf"), Some("all"), None).unwrap();
        assert_eq!(f.range, TimeRange::LastDays(30));
        assert_eq!(f.anchor, RangeAnchor::LatestEntry);
        assert_eq!(f.exchange, Some(Exchange::Kraken));
        assert_eq!(f.market_type, None);
        assert!(view_filters("soon", "now", None, None, None).is_err());
    }

    #[test]
    fn open_creates_then_saves() {
        let dir = std::env::temp_dir().join(format!("cli-ledger-{}", std::process::id()));
        let path = dir.join("ledger.json");
        let mut ledger = Ledger::open_with(Settings::default(), Some(path.clone())).unwrap();
        assert!(path.exists());
        assert!(ledger.db.entries.is_empty());

        ledger.db.deposit_baselines.set("all", 250.0);
        let store = ledger.store();
        ledger.save_store(&store).unwrap();

        let reopened = Ledger::open_with(Settings::default(), Some(path)).unwrap();
        assert_eq!(reopened.db.deposit_baselines.all, Some(250.0));
        assert_eq!(reopened.engine_context().conversion.base, "USD");
        fs::remove_dir_all(&dir).unwrap();
    }
}
