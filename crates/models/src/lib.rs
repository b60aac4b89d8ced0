use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// Venue tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Exchange {
    Blofin,
    Kraken,
    Unknown,
    Other(String),
}

impl Exchange {
    /// Normalizes a free-text venue label ("Kraken Futures", "krakenf", "BloFin").
    pub fn from_label(label: &str) -> Self {
        let l = label.trim().to_lowercase();
        if l.is_empty() || l == "unknown" {
            Exchange::Unknown
        } else if l.contains("kraken") {
            Exchange::Kraken
        } else if l.contains("blofin") {
            Exchange::Blofin
        } else {
            Exchange::Other(label.trim().to_uppercase())
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Exchange::Blofin => "BLOFIN",
            Exchange::Kraken => "KRAKEN",
            Exchange::Unknown => "UNKNOWN",
            Exchange::Other(tag) => tag.as_str(),
        }
    }
}

impl From<String> for Exchange {
    fn from(s: String) -> Self {
        Exchange::from_label(&s)
    }
}

impl From<Exchange> for String {
    fn from(e: Exchange) -> Self {
        e.tag().to_string()
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    Spot,
    Futures,
    Unknown,
}

impl MarketType {
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "spot" => MarketType::Spot,
            "futures" | "future" | "perp" | "perpetual" | "swap" => MarketType::Futures,
            _ => MarketType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "SPOT",
            MarketType::Futures => "FUTURES",
            MarketType::Unknown => "UNKNOWN",
        }
    }
}

/// Whether `net_pnl` was computed from its components or supplied by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetSource {
    #[default]
    Derived,
    Reported,
}

/// Closed set of recognised tabular schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    FormatAOrderHistory,
    FormatBSpotTrades,
    FormatBFuturesLog,
    RemoteSnapshot,
    Unknown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::FormatAOrderHistory => "FORMAT_A_ORDER_HISTORY",
            SourceFormat::FormatBSpotTrades => "FORMAT_B_SPOT_TRADES",
            SourceFormat::FormatBFuturesLog => "FORMAT_B_FUTURES_LOG",
            SourceFormat::RemoteSnapshot => "REMOTE_SNAPSHOT",
            SourceFormat::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized trade/settlement event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalLedgerEntry {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub exchange: Exchange,
    pub market_type: MarketType,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub realized_pnl: f64,
    #[serde(default)]
    pub fees: f64,
    #[serde(default)]
    pub funding: f64,
    pub net_pnl: f64,
    #[serde(default)]
    pub net_source: NetSource,
    #[serde(default)]
    pub notes: String,
}

/// Normalizer output before key derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerDraft {
    pub natural_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub exchange: Exchange,
    pub market_type: MarketType,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: f64,
    pub realized_pnl: f64,
    pub fees: f64,
    pub funding: f64,
    pub net_pnl: f64,
    pub net_source: NetSource,
    pub notes: String,
}

impl LedgerDraft {
    /// Builds a draft whose net is derived as `realized - fees + funding`.
    /// Fees are stored as an absolute value whatever sign the source used.
    #[allow(clippy::too_many_arguments)]
    pub fn derived(
        timestamp: DateTime<Utc>,
        exchange: Exchange,
        market_type: MarketType,
        symbol: &str,
        side: &str,
        realized_pnl: f64,
        fees: f64,
        funding: f64,
    ) -> Self {
        let fees = fees.abs();
        Self {
            natural_id: None,
            timestamp,
            exchange,
            market_type,
            symbol: normalize_symbol(symbol),
            side: side.trim().to_uppercase(),
            quantity: 0.0,
            price: 0.0,
            realized_pnl,
            fees,
            funding,
            net_pnl: realized_pnl - fees + funding,
            net_source: NetSource::Derived,
            notes: String::new(),
        }
    }

    pub fn with_natural_id(mut self, id: &str) -> Self {
        let id = id.trim();
        if !id.is_empty() {
            self.natural_id = Some(id.to_string());
        }
        self
    }

    pub fn with_fill(mut self, quantity: f64, price: f64) -> Self {
        self.quantity = quantity;
        self.price = price;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Trusts a net value supplied directly by the source.
    pub fn with_reported_net(mut self, net: f64) -> Self {
        self.net_pnl = net;
        self.net_source = NetSource::Reported;
        self
    }

    /// True when the row has any realized PnL, fee or funding effect.
    pub fn has_effect(&self) -> bool {
        self.realized_pnl != 0.0 || self.fees != 0.0 || self.funding != 0.0 || self.net_pnl != 0.0
    }

    pub fn into_entry(self, key: String) -> CanonicalLedgerEntry {
        CanonicalLedgerEntry {
            key,
            timestamp: self.timestamp,
            exchange: self.exchange,
            market_type: self.market_type,
            symbol: self.symbol,
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            realized_pnl: self.realized_pnl,
            fees: self.fees,
            funding: self.funding,
            net_pnl: self.net_pnl,
            net_source: self.net_source,
            notes: self.notes,
        }
    }
}

/// What a normalizer made of one raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Draft(LedgerDraft),
    /// No resolvable timestamp; the row is discarded and counted.
    MissingTimestamp,
    /// Administrative or zero-effect row.
    Filtered(&'static str),
}

pub fn normalize_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Cumulative net external funding per exchange, used only as a percentage denominator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default)]
    pub all: Option<f64>,
    #[serde(default)]
    pub per_exchange: HashMap<String, f64>,
}

impl BaselineConfig {
    /// Baseline for one exchange, or the "all" figure when `exchange` is `None`.
    pub fn for_exchange(&self, exchange: Option<&Exchange>) -> Option<f64> {
        match exchange {
            None => self.all,
            Some(e) => self.per_exchange.get(e.tag()).copied(),
        }
    }

    pub fn set(&mut self, scope: &str, amount: f64) {
        if scope.trim().eq_ignore_ascii_case("all") {
            self.all = Some(amount);
        } else {
            let tag = Exchange::from_label(scope).tag().to_string();
            self.per_exchange.insert(tag, amount);
        }
    }
}

/// A cached FX quote: 1 unit of `base` buys `rate` units of `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxQuote {
    pub base: String,
    pub target: String,
    pub rate: f64,
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub provider: String,
}

/// Runtime configuration, read from `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub settings_version: u32,
    /// Currency the ledger amounts are recorded in.
    pub base_currency: String,
    pub display_currency: String,
    pub database_path: String,
    pub journal_path: String,
    pub snapshot_url: Option<String>,
    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub frankfurter_url: String,
    pub open_er_api_url: String,
    pub server_addr: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settings_version: 1,
            base_currency: "USD".to_string(),
            display_currency: "USD".to_string(),
            database_path: "database/ledger.json".to_string(),
            journal_path: "database/runs.jsonl".to_string(),
            snapshot_url: None,
            poll_interval_secs: 300,
            http_timeout_secs: 15,
            frankfurter_url: "https://api.frankfurter.app".to_string(),
            open_er_api_url: "https://open.er-api.com".to_string(),
            server_addr: "127.0.0.1:3000".to_string(),
            log_filter: "info".to_string(),
        }
    }
}
