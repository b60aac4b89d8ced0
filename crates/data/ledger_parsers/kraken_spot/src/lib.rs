use anyhow::Result;
use csv::StringRecord;
use models::{Exchange, LedgerDraft, MarketType, RowOutcome};
use utils::dates::{parse_with_layouts, DateLayout};
use utils::parse_flexible_number;
use utils::tabular::{field, find_col, find_optional_col, optional_field, RowNormalizer};

pub const PARSER_NAME: &str = "kraken_spot";

/// Columns that identify a Kraken spot trades export.
pub const SIGNATURE: [&str; 7] = ["txid", "pair", "time", "type", "cost", "fee", "vol"];

const DATE_LAYOUTS: [DateLayout; 2] = [DateLayout::UnixSeconds, DateLayout::Iso];

/// Normalizer for Kraken spot trades.
///
/// Spot fills realize nothing on their own, so each row contributes only its fee:
/// `realized = 0`, `net = -fee`. Fee-free rows have no effect and are dropped.
pub struct KrakenSpotTradesParser {
    idx_txid: usize,
    idx_pair: usize,
    idx_time: usize,
    idx_type: usize,
    idx_cost: usize,
    idx_fee: usize,
    idx_vol: usize,
    idx_price: Option<usize>,
    idx_ordertype: Option<usize>,
    idx_ordertxid: Option<usize>,
}

impl KrakenSpotTradesParser {
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        Ok(Self {
            idx_txid: find_col(headers, "txid")?,
            idx_pair: find_col(headers, "pair")?,
            idx_time: find_col(headers, "time")?,
            idx_type: find_col(headers, "type")?,
            idx_cost: find_col(headers, "cost")?,
            idx_fee: find_col(headers, "fee")?,
            idx_vol: find_col(headers, "vol")?,
            idx_price: find_optional_col(headers, "price"),
            idx_ordertype: find_optional_col(headers, "ordertype"),
            idx_ordertxid: find_optional_col(headers, "ordertxid"),
        })
    }
}

impl RowNormalizer for KrakenSpotTradesParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn normalize(&self, rec: &StringRecord) -> RowOutcome {
        let Some(ts) = parse_with_layouts(field(rec, self.idx_time), &DATE_LAYOUTS) else {
            return RowOutcome::MissingTimestamp;
        };

        let fee = parse_flexible_number(field(rec, self.idx_fee));
        if fee == 0.0 {
            return RowOutcome::Filtered("zero fee spot fill");
        }

        let vol = parse_flexible_number(field(rec, self.idx_vol));
        let cost = parse_flexible_number(field(rec, self.idx_cost));
        let price = match self.idx_price.map(|i| parse_flexible_number(field(rec, i))) {
            Some(p) if p != 0.0 => p,
            _ if vol != 0.0 => cost / vol,
            _ => 0.0,
        };

        let mut notes = String::from("kraken spot trade");
        let ordertype = optional_field(rec, self.idx_ordertype);
        if !ordertype.is_empty() {
            notes.push_str(&format!("; {}", ordertype));
        }
        let order_id = optional_field(rec, self.idx_ordertxid);
        if !order_id.is_empty() {
            notes.push_str(&format!("; order {}", order_id));
        }

        let draft = LedgerDraft::derived(
            ts,
            Exchange::Kraken,
            MarketType::Spot,
            field(rec, self.idx_pair),
            &map_side(field(rec, self.idx_type)),
            0.0,
            fee,
            0.0,
        )
        .with_natural_id(field(rec, self.idx_txid))
        .with_fill(vol, price)
        .with_notes(notes);

        RowOutcome::Draft(draft)
    }
}

fn map_side(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "buy" => "BUY".to_string(),
        "sell" => "SELL".to_string(),
        _ => raw.trim().to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use utils::tabular::Table;

    const EXPORT: &str = "\"txid\",\"ordertxid\",\"pair\",\"time\",\"type\",\"ordertype\",\"price\",\"cost\",\"fee\",\"vol\",\"margin\",\"misc\",\"ledgers\"
\"TXA1\",\"OQ1\",\"XBTUSD\",\"2024-01-05 12:34:56.1234\",\"buy\",\"limit\",\"42000.0\",\"420.0\",\"1.092\",\"0.01\",\"0\",\"\",\"L1\"
\"TXA2\",\"OQ2\",\"ETHUSD\",\"1704450000\",\"sell\",\"market\",\"\",\"1150.0\",\"-2.99\",\"0.5\",\"0\",\"\",\"L2\"
\"TXA3\",\"OQ3\",\"ETHUSD\",\"1704450100\",\"sell\",\"market\",\"2300\",\"1150.0\",\"0\",\"0.5\",\"0\",\"\",\"L3\"
\"TXA4\",\"OQ4\",\"ETHUSD\",\"\",\"sell\",\"market\",\"2300\",\"1150.0\",\"1\",\"0.5\",\"0\",\"\",\"L4\"
";

    fn outcomes() -> Vec<RowOutcome> {
        let table = Table::parse(EXPORT).unwrap();
        let parser = KrakenSpotTradesParser::from_headers(&table.headers).unwrap();
        table.records.iter().map(|r| parser.normalize(r)).collect()
    }

    #[test]
    fn iso_time_and_natural_id() {
        let out = outcomes();
        let RowOutcome::Draft(d) = &out[0] else { panic!("expected draft") };
        assert_eq!(d.natural_id.as_deref(), Some("TXA1"));
        assert_eq!(d.timestamp.timestamp(), Utc.with_ymd_and_hms(2024, 1, 5, 12, 34, 56).unwrap().timestamp());
        assert_eq!(d.side, "BUY");
        assert_eq!(d.realized_pnl, 0.0);
        assert!((d.net_pnl + 1.092).abs() < 1e-9);
        assert_eq!(d.price, 42000.0);
        assert_eq!(d.notes, "kraken spot trade; limit; order OQ1");
    }

    #[test]
    fn unix_time_negative_fee_and_derived_price() {
        let out = outcomes();
        let RowOutcome::Draft(d) = &out[1] else { panic!("expected draft") };
        assert_eq!(d.timestamp, Utc.with_ymd_and_hms(2024, 1, 5, 10, 20, 0).unwrap());
        assert_eq!(d.fees, 2.99);
        assert!((d.net_pnl + 2.99).abs() < 1e-9);
        assert_eq!(d.price, 2300.0);
        assert_eq!(d.side, "SELL");
    }

    #[test]
    fn zero_fee_and_missing_time_dropped() {
        let out = outcomes();
        assert_eq!(out[2], RowOutcome::Filtered("zero fee spot fill"));
        assert_eq!(out[3], RowOutcome::MissingTimestamp);
    }
}
