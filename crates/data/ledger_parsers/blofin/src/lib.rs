use anyhow::Result;
use csv::StringRecord;
use models::{Exchange, LedgerDraft, MarketType, RowOutcome};
use utils::dates::{parse_with_layouts, DateLayout};
use utils::parse_flexible_number;
use utils::tabular::{field, find_col, find_optional_col, optional_field, RowNormalizer};

pub const PARSER_NAME: &str = "blofin";

/// Columns that identify a BloFin futures order-history export.
pub const SIGNATURE: [&str; 8] = [
    "underlying asset",
    "order time",
    "side",
    "avg fill",
    "filled",
    "pnl",
    "fee",
    "status",
];

const DATE_LAYOUTS: [DateLayout; 2] = [DateLayout::DayMonthYear, DateLayout::DayMonNameYear];

/// Normalizer for BloFin order history. Only filled orders are trades.
pub struct BlofinOrderHistoryParser {
    idx_asset: usize,
    idx_time: usize,
    idx_side: usize,
    idx_avg_fill: usize,
    idx_filled: usize,
    idx_pnl: usize,
    idx_fee: usize,
    idx_status: usize,
    idx_margin_mode: Option<usize>,
    idx_leverage: Option<usize>,
}

impl BlofinOrderHistoryParser {
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        Ok(Self {
            idx_asset: find_col(headers, "underlying asset")?,
            idx_time: find_col(headers, "order time")?,
            idx_side: find_col(headers, "side")?,
            idx_avg_fill: find_col(headers, "avg fill")?,
            idx_filled: find_col(headers, "filled")?,
            idx_pnl: find_col(headers, "pnl")?,
            idx_fee: find_col(headers, "fee")?,
            idx_status: find_col(headers, "status")?,
            idx_margin_mode: find_optional_col(headers, "margin mode"),
            idx_leverage: find_optional_col(headers, "leverage"),
        })
    }
}

impl RowNormalizer for BlofinOrderHistoryParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn normalize(&self, rec: &StringRecord) -> RowOutcome {
        if !is_filled_status(field(rec, self.idx_status)) {
            return RowOutcome::Filtered("order not filled");
        }

        let Some(ts) = parse_with_layouts(field(rec, self.idx_time), &DATE_LAYOUTS) else {
            return RowOutcome::MissingTimestamp;
        };

        let draft = LedgerDraft::derived(
            ts,
            Exchange::Blofin,
            MarketType::Futures,
            field(rec, self.idx_asset),
            &map_side(field(rec, self.idx_side)),
            parse_flexible_number(field(rec, self.idx_pnl)),
            parse_flexible_number(field(rec, self.idx_fee)),
            0.0,
        )
        .with_fill(
            parse_flexible_number(field(rec, self.idx_filled)),
            parse_flexible_number(field(rec, self.idx_avg_fill)),
        )
        .with_notes(build_notes(
            optional_field(rec, self.idx_margin_mode),
            optional_field(rec, self.idx_leverage),
        ));

        if !draft.has_effect() {
            return RowOutcome::Filtered("no pnl or fee effect");
        }
        RowOutcome::Draft(draft)
    }
}

fn is_filled_status(status: &str) -> bool {
    matches!(
        status.trim().to_lowercase().as_str(),
        "filled" | "partially filled" | "partial fill"
    )
}

fn map_side(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "open long" | "close short" | "buy" => "BUY".to_string(),
        "open short" | "close long" | "sell" => "SELL".to_string(),
        _ => raw.trim().to_uppercase(),
    }
}

fn build_notes(margin_mode: &str, leverage: &str) -> String {
    let mut notes = String::from("blofin order history");
    if !margin_mode.is_empty() {
        notes.push_str(&format!("; {}", margin_mode.to_lowercase()));
    }
    if !leverage.is_empty() {
        notes.push_str(&format!("; {}x", leverage.trim_end_matches(['x', 'X'])));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use utils::tabular::Table;

    const EXPORT: &str = "\u{feff}Underlying Asset,Margin Mode,Leverage,Order Time,Side,Avg Fill,Price,Filled,Total,PNL,PNL%,Fee,Order Options,Reduce-only,Status
BTCUSDT,Cross,10,05/01/2024 10:20:30,Open Long,42000.5,Market,0.010 BTC,420 USDT,--,--,0.25 USDT,--,N,Filled
BTCUSDT,Cross,10,06/01/2024 11:00:00,Close Long,43000,Market,0.010 BTC,430 USDT,10.00 USDT,2.3%,-0.26 USDT,--,Y,Filled
ETHUSDT,Isolated,5,06/01/2024 12:00:00,Open Short,--,2300,0,--,--,--,--,--,N,Canceled
ETHUSDT,Isolated,5,07/Jan/2024 09:15:00,Close Short,2250,Market,0.5 ETH,1125 USDT,-4.5 USDT,-1%,0.3 USDT,--,Y,Partially Filled
ETHUSDT,Isolated,5,not a date,Close Short,2250,Market,0.5 ETH,1125 USDT,-4.5 USDT,-1%,0.3 USDT,--,Y,Filled
";

    fn parser() -> (Table, BlofinOrderHistoryParser) {
        let table = Table::parse(EXPORT).unwrap();
        let parser = BlofinOrderHistoryParser::from_headers(&table.headers).unwrap();
        (table, parser)
    }

    #[test]
    fn filled_rows_become_drafts() {
        let (table, parser) = parser();
        let out: Vec<RowOutcome> = table.records.iter().map(|r| parser.normalize(r)).collect();

        let RowOutcome::Draft(open) = &out[0] else { panic!("expected draft") };
        assert_eq!(open.timestamp, Utc.with_ymd_and_hms(2024, 1, 5, 10, 20, 30).unwrap());
        assert_eq!(open.side, "BUY");
        assert_eq!(open.symbol, "BTCUSDT");
        assert_eq!(open.quantity, 0.010);
        assert_eq!(open.price, 42000.5);
        assert_eq!(open.realized_pnl, 0.0);
        assert!((open.net_pnl + 0.25).abs() < 1e-9);
        assert_eq!(open.market_type, MarketType::Futures);
        assert_eq!(open.notes, "blofin order history; cross; 10x");

        let RowOutcome::Draft(close) = &out[1] else { panic!("expected draft") };
        assert_eq!(close.side, "SELL");
        assert_eq!(close.fees, 0.26);
        assert!((close.net_pnl - (10.0 - 0.26)).abs() < 1e-9);
    }

    #[test]
    fn cancelled_and_undated_rows_are_dropped() {
        let (table, parser) = parser();
        assert_eq!(parser.normalize(&table.records[2]), RowOutcome::Filtered("order not filled"));
        assert_eq!(parser.normalize(&table.records[4]), RowOutcome::MissingTimestamp);
    }

    #[test]
    fn month_name_dates_and_partial_fills() {
        let (table, parser) = parser();
        let RowOutcome::Draft(d) = parser.normalize(&table.records[3]) else { panic!("expected draft") };
        assert_eq!(d.timestamp, Utc.with_ymd_and_hms(2024, 1, 7, 9, 15, 0).unwrap());
        assert_eq!(d.side, "BUY");
        assert!((d.net_pnl - (-4.5 - 0.3)).abs() < 1e-9);
    }

    #[test]
    fn missing_column_fails_construction() {
        let headers = vec!["Underlying Asset".to_string(), "Order Time".to_string()];
        assert!(BlofinOrderHistoryParser::from_headers(&headers).is_err());
    }

    #[test]
    fn only_filled_rows_become_drafts() {
        let table = Table::parse(EXPORT).unwrap();
        let parser = BlofinOrderHistoryParser::from_headers(&table.headers).unwrap();
        let drafts = table
            .records
            .iter()
            .filter(|rec| matches!(parser.normalize(rec), RowOutcome::Draft(_)))
            .count();
        assert_eq!(drafts, 3);
    }
}
