use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use models::{Exchange, LedgerDraft, MarketType, RowOutcome};
use serde::Deserialize;
use serde_json::Value;
use utils::dates::{parse_iso, parse_unix_seconds};
use utils::numbers::deserialize_flex_opt;

pub const PARSER_NAME: &str = "remote_snapshot";

/// Which array the snapshot carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotShape {
    Rows,
    LegacyClosedTrades,
}

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    rows: Option<Vec<Value>>,
    #[serde(default)]
    closed_trades: Option<Vec<Value>>,
    #[serde(default)]
    generated_at: Option<String>,
}

/// Current snapshot row: already close to the canonical entry.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRow {
    #[serde(default)]
    datetime: Option<Value>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    market_type: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    qty: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    realized_pnl_usd: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    fees_usd: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    funding_usd: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    net_pnl_usd: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    trade_key: Option<String>,
}

/// Older snapshot shape with its own field names.
#[derive(Debug, Default, Deserialize)]
struct LegacyClosedTrade {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default, alias = "marketType")]
    market_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    size: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    exit_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    pnl: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    fee: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flex_opt")]
    funding: Option<f64>,
    #[serde(default)]
    closed_at: Option<Value>,
}

/// Snapshot normalized row by row.
#[derive(Debug, Clone)]
pub struct ParsedSnapshot {
    pub shape: SnapshotShape,
    pub generated_at: Option<String>,
    pub outcomes: Vec<RowOutcome>,
}

impl ParsedSnapshot {
    pub fn drafts(&self) -> Vec<LedgerDraft> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RowOutcome::Draft(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Parses a snapshot document. The payload is untrusted: a row that does not
/// fit its shape is filtered, never fatal. Only an unreadable document, or one
/// with neither `rows` nor `closed_trades`, is an error.
pub fn parse_snapshot(json: &str) -> Result<ParsedSnapshot> {
    let doc: SnapshotDocument =
        serde_json::from_str(json).context("Snapshot is not a valid JSON document")?;

    if let Some(rows) = doc.rows {
        return Ok(ParsedSnapshot {
            shape: SnapshotShape::Rows,
            generated_at: doc.generated_at,
            outcomes: rows.into_iter().map(normalize_row).collect(),
        });
    }
    if let Some(trades) = doc.closed_trades {
        return Ok(ParsedSnapshot {
            shape: SnapshotShape::LegacyClosedTrades,
            generated_at: doc.generated_at,
            outcomes: trades.into_iter().map(normalize_legacy).collect(),
        });
    }
    Err(anyhow!("Snapshot has neither a 'rows' nor a 'closed_trades' array"))
}

fn normalize_row(raw: Value) -> RowOutcome {
    let Ok(row) = serde_json::from_value::<SnapshotRow>(raw) else {
        return RowOutcome::Filtered("malformed snapshot row");
    };
    let Some(ts) = row.datetime.as_ref().and_then(parse_timestamp_value) else {
        return RowOutcome::MissingTimestamp;
    };

    let mut draft = LedgerDraft::derived(
        ts,
        Exchange::from_label(row.exchange.as_deref().unwrap_or("")),
        MarketType::from_label(row.market_type.as_deref().unwrap_or("")),
        row.symbol.as_deref().unwrap_or(""),
        row.side.as_deref().unwrap_or(""),
        row.realized_pnl_usd.unwrap_or(0.0),
        row.fees_usd.unwrap_or(0.0),
        row.funding_usd.unwrap_or(0.0),
    )
    .with_natural_id(row.trade_key.as_deref().unwrap_or(""))
    .with_fill(row.qty.unwrap_or(0.0), row.price.unwrap_or(0.0))
    .with_notes(row.notes.unwrap_or_default());

    if let Some(net) = row.net_pnl_usd {
        draft = draft.with_reported_net(net);
    }

    if !draft.has_effect() {
        return RowOutcome::Filtered("no pnl, fee or funding effect");
    }
    RowOutcome::Draft(draft)
}

fn normalize_legacy(raw: Value) -> RowOutcome {
    let Ok(t) = serde_json::from_value::<LegacyClosedTrade>(raw) else {
        return RowOutcome::Filtered("malformed closed trade");
    };
    let Some(ts) = t.closed_at.as_ref().and_then(parse_timestamp_value) else {
        return RowOutcome::MissingTimestamp;
    };

    let id = match &t.id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let draft = LedgerDraft::derived(
        ts,
        Exchange::from_label(t.exchange.as_deref().unwrap_or("")),
        MarketType::from_label(t.market_type.as_deref().unwrap_or("")),
        t.symbol.as_deref().unwrap_or(""),
        t.side.as_deref().unwrap_or(""),
        t.pnl.unwrap_or(0.0),
        t.fee.unwrap_or(0.0),
        t.funding.unwrap_or(0.0),
    )
    .with_natural_id(&id)
    .with_fill(t.size.unwrap_or(0.0), t.exit_price.or(t.price).unwrap_or(0.0))
    .with_notes("closed trade");

    if !draft.has_effect() {
        return RowOutcome::Filtered("no pnl, fee or funding effect");
    }
    RowOutcome::Draft(draft)
}

/// Strings are read as ISO or Unix seconds; numbers as Unix seconds, or
/// milliseconds when they are too large to be seconds.
fn parse_timestamp_value(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_iso(s).or_else(|| parse_unix_seconds(s)),
        Value::Number(n) => {
            let x = n.as_f64()?;
            let secs = if x.abs() > 1e11 { x / 1000.0 } else { x };
            parse_unix_seconds(&secs.to_string())
        }
        _ => None,
    }
}
