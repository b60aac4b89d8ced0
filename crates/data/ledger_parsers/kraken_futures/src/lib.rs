use anyhow::Result;
use csv::StringRecord;
use models::{Exchange, LedgerDraft, MarketType, RowOutcome};
use utils::dates::{parse_with_layouts, DateLayout};
use utils::parse_flexible_number;
use utils::tabular::{field, find_col, find_optional_col, optional_field, RowNormalizer};

pub const PARSER_NAME: &str = "kraken_futures";

/// Columns that identify a Kraken futures account log.
pub const SIGNATURE: [&str; 6] = [
    "datetime",
    "type",
    "symbol",
    "realized pnl",
    "fee",
    "realized funding",
];

const DATE_LAYOUTS: [DateLayout; 2] = [DateLayout::Iso, DateLayout::DayMonNameYear];

/// Event classes in the account log `type` column.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogEvent {
    Transfer,
    Liquidation,
    Funding,
    Settlement,
    Trade,
    Other(String),
}

impl LogEvent {
    fn classify(raw: &str) -> Self {
        let t = raw.trim().to_lowercase();
        if t.contains("transfer") {
            LogEvent::Transfer
        } else if t.contains("liquidation") {
            LogEvent::Liquidation
        } else if t.contains("funding") {
            LogEvent::Funding
        } else if t.contains("settlement") {
            LogEvent::Settlement
        } else if t == "futures trade" {
            LogEvent::Trade
        } else {
            LogEvent::Other(raw.trim().to_uppercase())
        }
    }
}

/// Normalizer for the Kraken futures account log.
pub struct KrakenFuturesLogParser {
    idx_time: usize,
    idx_type: usize,
    idx_symbol: usize,
    idx_realized_pnl: usize,
    idx_fee: usize,
    idx_funding: usize,
    idx_uid: Option<usize>,
    idx_contract: Option<usize>,
    idx_side: Option<usize>,
    idx_change: Option<usize>,
    idx_trade_price: Option<usize>,
}

impl KrakenFuturesLogParser {
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        Ok(Self {
            idx_time: find_col(headers, "datetime")?,
            idx_type: find_col(headers, "type")?,
            idx_symbol: find_col(headers, "symbol")?,
            idx_realized_pnl: find_col(headers, "realized pnl")?,
            idx_fee: find_col(headers, "fee")?,
            idx_funding: find_col(headers, "realized funding")?,
            idx_uid: find_optional_col(headers, "uid").or_else(|| find_optional_col(headers, "id")),
            idx_contract: find_optional_col(headers, "contract"),
            idx_side: find_optional_col(headers, "side"),
            idx_change: find_optional_col(headers, "change"),
            idx_trade_price: find_optional_col(headers, "trade price"),
        })
    }
}

impl RowNormalizer for KrakenFuturesLogParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn normalize(&self, rec: &StringRecord) -> RowOutcome {
        let raw_type = field(rec, self.idx_type);
        let side = match LogEvent::classify(raw_type) {
            LogEvent::Transfer => return RowOutcome::Filtered("account transfer"),
            LogEvent::Liquidation => "LIQUIDATION".to_string(),
            LogEvent::Funding => "FUNDING".to_string(),
            LogEvent::Settlement => "SETTLEMENT".to_string(),
            LogEvent::Trade => optional_field(rec, self.idx_side).to_uppercase(),
            LogEvent::Other(label) => label,
        };

        let Some(ts) = parse_with_layouts(field(rec, self.idx_time), &DATE_LAYOUTS) else {
            return RowOutcome::MissingTimestamp;
        };

        let symbol = match field(rec, self.idx_symbol) {
            "" => optional_field(rec, self.idx_contract),
            s => s,
        };

        let draft = LedgerDraft::derived(
            ts,
            Exchange::Kraken,
            MarketType::Futures,
            symbol,
            &side,
            parse_flexible_number(field(rec, self.idx_realized_pnl)),
            parse_flexible_number(field(rec, self.idx_fee)),
            parse_flexible_number(field(rec, self.idx_funding)),
        )
        .with_natural_id(optional_field(rec, self.idx_uid))
        .with_fill(
            parse_flexible_number(optional_field(rec, self.idx_change)),
            parse_flexible_number(optional_field(rec, self.idx_trade_price)),
        )
        .with_notes(raw_type);

        if !draft.has_effect() {
            return RowOutcome::Filtered("no pnl, fee or funding effect");
        }
        RowOutcome::Draft(draft)
    }
}
