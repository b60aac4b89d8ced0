//! Aggregation engine: filtered views, equity series, calendar-aligned
//! buckets, KPIs, and the composed dashboard served to the rendering layer.
//!
//! Every entry point is a pure function of its inputs. Currency and baseline
//! state arrive through [`EngineContext`] rather than being read from globals.

pub mod calendar;
pub mod kpis;
pub mod series;
pub mod view;

pub use calendar::{calendar_aggregate, CalendarCell, CalendarGranularity, DayClass};
pub use kpis::{by_symbol, kpis, percent_of_base, Kpis, SymbolBreakdown};
pub use series::{equity_series, max_drawdown, time_buckets, Bucketing, EquityPoint, PeriodBucket};
pub use view::{filtered_view, sort_entries, RangeAnchor, SortOrder, TimeRange, ViewFilters};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fx_rates::ConversionState;
use models::{BaselineConfig, CanonicalLedgerEntry, FxQuote, Settings};
use serde::Serialize;
use std::{fs, path::Path};

pub const DAILY_WINDOW_DAYS: u32 = 30;
pub const MONTHLY_WINDOW_MONTHS: u32 = 12;

/// Explicit state the engine needs besides the entries themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineContext {
    pub conversion: ConversionState,
    pub baselines: BaselineConfig,
}

impl EngineContext {
    pub fn identity(base: &str) -> Self {
        Self {
            conversion: ConversionState::identity(base),
            baselines: BaselineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetadata {
    pub generated_at: String,
    pub range: String,
    pub base_currency: String,
    /// Currency the amounts below are expressed in. Falls back to the base
    /// currency when no rate is cached.
    pub display_currency: String,
    pub fx: Option<FxQuote>,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub kpis: Kpis,
    /// Net as a percentage of the applicable deposit baseline; `None` when
    /// no usable baseline is configured.
    pub percent_of_base: Option<f64>,
    pub max_drawdown: f64,
    pub equity: Vec<EquityPoint>,
    pub daily: Vec<PeriodBucket>,
    pub monthly: Vec<PeriodBucket>,
    pub by_symbol: Vec<SymbolBreakdown>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

impl Dashboard {
    /// Converts money figures into the display currency and rounds them.
    /// Ratios are currency-free and only rounded.
    fn finalize(mut self, conversion: &ConversionState) -> Self {
        let money = |v: f64| round2(conversion.convert(v));

        self.kpis.net = money(self.kpis.net);
        self.kpis.fees = money(self.kpis.fees);
        self.kpis.funding = money(self.kpis.funding);
        self.kpis.win_rate = round4(self.kpis.win_rate);
        self.percent_of_base = self.percent_of_base.map(round4);
        self.max_drawdown = money(self.max_drawdown);
        for p in self.equity.iter_mut() {
            p.cumulative_net = money(p.cumulative_net);
        }
        for b in self.daily.iter_mut().chain(self.monthly.iter_mut()) {
            b.net = money(b.net);
            b.fees = money(b.fees);
            b.funding = money(b.funding);
        }
        for s in self.by_symbol.iter_mut() {
            s.net = money(s.net);
            s.fees = money(s.fees);
        }
        self
    }
}

/// Composes the dashboard for the entries that pass `filters`.
///
/// Aggregates are computed in the ledger's base currency and converted once
/// at the end, so a missing FX rate only changes the unit, never the shape.
pub fn build_dashboard(
    entries: &[CanonicalLedgerEntry],
    filters: &ViewFilters,
    ctx: &EngineContext,
    now: DateTime<Utc>,
) -> Dashboard {
    let reference = filters.reference(entries, now);
    let view = filtered_view(entries, filters, now, SortOrder::Ascending);

    let summary = kpis(&view);
    let baseline = ctx.baselines.for_exchange(filters.exchange.as_ref());
    let equity = equity_series(&view);
    let drawdown = max_drawdown(&equity);

    let dashboard = Dashboard {
        metadata: DashboardMetadata {
            generated_at: now.to_rfc3339(),
            range: filters.range.label(),
            base_currency: ctx.conversion.base.clone(),
            display_currency: ctx.conversion.display_currency().to_string(),
            fx: ctx.conversion.quote.clone(),
            entry_count: view.len(),
        },
        percent_of_base: percent_of_base(summary.net, baseline),
        kpis: summary,
        max_drawdown: drawdown,
        daily: time_buckets(&view, Bucketing::Daily { days: DAILY_WINDOW_DAYS }, reference),
        monthly: time_buckets(&view, Bucketing::Monthly { months: MONTHLY_WINDOW_MONTHS }, reference),
        by_symbol: by_symbol(&view),
        equity,
    };
    dashboard.finalize(&ctx.conversion)
}

/// Reads the ledger database and builds the dashboard using the cached FX
/// quote and stored baselines.
pub fn generate_dashboard(
    database_path: &Path,
    settings: &Settings,
    filters: &ViewFilters,
    now: DateTime<Utc>,
) -> Result<Dashboard> {
    let db = utils::read_database(database_path)
        .with_context(|| format!("Reading ledger database {}", database_path.display()))?;
    let ctx = EngineContext {
        conversion: ConversionState::new(&settings.base_currency, &settings.display_currency, db.fx_cache.clone()),
        baselines: db.deposit_baselines.clone(),
    };
    tracing::debug!(entries = db.entries.len(), range = %filters.range.label(), "building dashboard");
    Ok(build_dashboard(&db.entries, filters, &ctx, now))
}

pub fn write_dashboard_json(output: &Dashboard, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(output)?;
    fs::write(out_path, json)?;
    Ok(())
}
