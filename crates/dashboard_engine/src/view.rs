use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use models::{CanonicalLedgerEntry, Exchange, MarketType};
use serde::{Deserialize, Serialize};
use utils::LedgerFilter;

/// How far back a view reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    All,
    /// The reference day and the `n - 1` calendar days before it, UTC.
    LastDays(u32),
    YearToDate,
}

impl TimeRange {
    /// Parses `all`, `ytd` or `<n>d` (e.g. `30d`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" | "all" => Some(TimeRange::All),
            "ytd" => Some(TimeRange::YearToDate),
            _ => s
                .strip_suffix('d')
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .map(TimeRange::LastDays),
        }
    }

    pub fn label(&self) -> String {
        match self {
            TimeRange::All => "all".to_string(),
            TimeRange::LastDays(n) => format!("{n}d"),
            TimeRange::YearToDate => "ytd".to_string(),
        }
    }
}

/// What a range cutoff is measured from.
///
/// `Now` gives live semantics; `LatestEntry` keeps a view stable when the data
/// stops growing (e.g. an old export).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RangeAnchor {
    #[default]
    Now,
    LatestEntry,
}

impl RangeAnchor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "now" => Some(RangeAnchor::Now),
            "latest" | "latest_entry" | "data" => Some(RangeAnchor::LatestEntry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first, for series construction.
    Ascending,
    /// Newest first, for display.
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilters {
    pub range: TimeRange,
    pub anchor: RangeAnchor,
    pub exchange: Option<Exchange>,
    pub market_type: Option<MarketType>,
    pub search: Option<String>,
}

impl ViewFilters {
    /// The instant ranges are measured from.
    pub fn reference(&self, entries: &[CanonicalLedgerEntry], now: DateTime<Utc>) -> DateTime<Utc> {
        match self.anchor {
            RangeAnchor::Now => now,
            RangeAnchor::LatestEntry => entries.iter().map(|e| e.timestamp).max().unwrap_or(now),
        }
    }

    /// Inclusive lower bound of the range, if any. A day count reaching past
    /// the earliest representable date bounds nothing.
    pub fn cutoff(&self, entries: &[CanonicalLedgerEntry], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let reference = self.reference(entries, now).date_naive();
        let start = match self.range {
            TimeRange::All => return None,
            TimeRange::LastDays(n) => reference.checked_sub_days(Days::new(u64::from(n.max(1)) - 1))?,
            TimeRange::YearToDate => NaiveDate::from_ymd_opt(reference.year(), 1, 1)?,
        };
        start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
    }

    pub fn ledger_filter(&self, entries: &[CanonicalLedgerEntry], now: DateTime<Utc>) -> LedgerFilter {
        LedgerFilter {
            since: self.cutoff(entries, now),
            exchange: self.exchange.clone(),
            market_type: self.market_type,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Applies range, exchange, market and search filters and sorts the result.
/// Entries at the same instant are ordered by key so the output is stable.
pub fn filtered_view(
    entries: &[CanonicalLedgerEntry],
    filters: &ViewFilters,
    now: DateTime<Utc>,
    order: SortOrder,
) -> Vec<CanonicalLedgerEntry> {
    let filter = filters.ledger_filter(entries, now);
    let mut out: Vec<CanonicalLedgerEntry> = entries.iter().filter(|e| filter.matches(e)).cloned().collect();
    sort_entries(&mut out, order);
    out
}

pub fn sort_entries(entries: &mut [CanonicalLedgerEntry], order: SortOrder) {
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
    if order == SortOrder::Descending {
        entries.reverse();
    }
}
