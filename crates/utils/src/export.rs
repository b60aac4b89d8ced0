use anyhow::{Context, Result};
use models::{CanonicalLedgerEntry, NetSource};

pub const EXPORT_COLUMNS: [&str; 14] = [
    "key",
    "timestamp",
    "exchange",
    "marketType",
    "symbol",
    "side",
    "quantity",
    "price",
    "realizedPnl",
    "fees",
    "funding",
    "netPnl",
    "netSource",
    "notes",
];

/// Renders entries as a flat CSV, one entry per row, every value quoted.
pub fn export_csv(entries: &[CanonicalLedgerEntry]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    wtr.write_record(EXPORT_COLUMNS)?;
    for e in entries {
        let net_source = match e.net_source {
            NetSource::Derived => "derived",
            NetSource::Reported => "reported",
        };
        wtr.write_record([
            e.key.clone(),
            e.timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            e.exchange.tag().to_string(),
            e.market_type.as_str().to_string(),
            e.symbol.clone(),
            e.side.clone(),
            e.quantity.to_string(),
            e.price.to_string(),
            e.realized_pnl.to_string(),
            e.fees.to_string(),
            e.funding.to_string(),
            e.net_pnl.to_string(),
            net_source.to_string(),
            e.notes.clone(),
        ])
        .with_context(|| format!("Cannot write export row for {}", e.key))?;
    }

    let bytes = wtr.into_inner().context("Cannot flush CSV export")?;
    String::from_utf8(bytes).context("CSV export is not valid UTF-8")
}
