use models::{CanonicalLedgerEntry, LedgerDraft, RowOutcome, SourceFormat};
use serde::Serialize;
use std::path::Path;
use utils::{derive_keys, LedgerStore, MergeStats, Table};

use crate::detect::{detect_format, normalizer_for};
use crate::ImportError;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub format: SourceFormat,
    pub rows_read: usize,
    /// Rows discarded because no timestamp could be resolved.
    pub missing_timestamp: usize,
    /// Administrative or zero-effect rows.
    pub filtered: usize,
    pub entries: usize,
    pub merge: MergeStats,
    /// Snapshot `generated_at`, when the source carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Normalized and keyed entries that have not touched the store yet.
///
/// Preparing is pure, so it can run before a caller takes the store's write lock.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub format: SourceFormat,
    pub rows_read: usize,
    pub missing_timestamp: usize,
    pub filtered: usize,
    pub entries: Vec<CanonicalLedgerEntry>,
    pub cursor: Option<String>,
}

impl PreparedBatch {
    fn from_outcomes(format: SourceFormat, outcomes: Vec<RowOutcome>, cursor: Option<String>) -> Self {
        let rows_read = outcomes.len();
        let mut missing_timestamp = 0;
        let mut filtered = 0;
        let mut drafts: Vec<LedgerDraft> = Vec::with_capacity(rows_read);

        for outcome in outcomes {
            match outcome {
                RowOutcome::Draft(d) => drafts.push(d),
                RowOutcome::MissingTimestamp => missing_timestamp += 1,
                RowOutcome::Filtered(reason) => {
                    tracing::trace!(reason, "row filtered");
                    filtered += 1;
                }
            }
        }

        tracing::debug!(
            format = %format,
            rows_read,
            missing_timestamp,
            filtered,
            drafts = drafts.len(),
            "normalized source"
        );

        Self {
            format,
            rows_read,
            missing_timestamp,
            filtered,
            entries: derive_keys(drafts),
            cursor,
        }
    }

    /// Upserts the batch. Runs to completion before returning.
    pub fn commit(self, store: &mut LedgerStore) -> IngestReport {
        let entries = self.entries.len();
        let merge = store.upsert_many(self.entries);
        tracing::info!(
            format = %self.format,
            added = merge.added,
            replaced = merge.skipped,
            rejected = merge.rejected,
            store_size = store.len(),
            "ledger upsert committed"
        );
        IngestReport {
            format: self.format,
            rows_read: self.rows_read,
            missing_timestamp: self.missing_timestamp,
            filtered: self.filtered,
            entries,
            merge,
            cursor: self.cursor,
        }
    }
}

/// Detects the CSV format from its headers and normalizes every row.
///
/// An unrecognized header set is an error naming the headers; no rows are produced.
pub fn prepare_csv(text: &str) -> Result<PreparedBatch, ImportError> {
    let table = Table::parse(text).map_err(|e| ImportError::Parse(format!("{:#}", e)))?;
    let format = detect_format(&table.headers);
    if format == SourceFormat::Unknown {
        tracing::warn!(headers = ?table.headers, "unrecognized CSV headers");
        return Err(ImportError::UnknownFormat {
            headers: table.headers,
        });
    }

    let normalizer = normalizer_for(format, &table.headers)?;
    let outcomes = table.records.iter().map(|rec| normalizer.normalize(rec)).collect();
    Ok(PreparedBatch::from_outcomes(format, outcomes, None))
}

/// Normalizes a remote snapshot document (`rows` or legacy `closed_trades`).
pub fn prepare_snapshot(json: &str) -> Result<PreparedBatch, ImportError> {
    let parsed = snapshot_parser::parse_snapshot(json)
        .map_err(|e| ImportError::Snapshot(format!("{:#}", e)))?;
    Ok(PreparedBatch::from_outcomes(
        SourceFormat::RemoteSnapshot,
        parsed.outcomes,
        parsed.generated_at,
    ))
}

pub fn ingest_csv(store: &mut LedgerStore, text: &str) -> Result<IngestReport, ImportError> {
    Ok(prepare_csv(text)?.commit(store))
}

pub fn ingest_csv_file<P: AsRef<Path>>(
    store: &mut LedgerStore,
    path: P,
) -> Result<IngestReport, ImportError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    ingest_csv(store, &text)
}

pub fn ingest_snapshot(store: &mut LedgerStore, json: &str) -> Result<IngestReport, ImportError> {
    Ok(prepare_snapshot(json)?.commit(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOT: &str = "txid,pair,time,type,cost,fee,vol
T1,XBTUSD,1704450000,buy,420,1.0,0.01
T2,XBTUSD,1704450100,sell,421,0,0.01
T3,XBTUSD,,sell,421,1.0,0.01
";

    #[test]
    fn report_counts_every_row() {
        let mut store = LedgerStore::new();
        let report = ingest_csv(&mut store, SPOT).unwrap();
        assert_eq!(report.format, SourceFormat::FormatBSpotTrades);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.missing_timestamp, 1);
        assert_eq!(report.entries, 1);
        assert_eq!(report.merge.added, 1);
        assert!(store.get("KRAKEN|T1").is_some());
    }

    #[test]
    fn unknown_headers_touch_nothing() {
        let mut store = LedgerStore::new();
        let err = ingest_csv(&mut store, "date,amount\n2024-01-01,5\n").unwrap_err();
        assert!(err.to_string().contains("date, amount"));
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_cursor_is_reported() {
        let mut store = LedgerStore::new();
        let json = r#"{"generated_at":"2024-01-06T00:00:00Z","rows":[
            {"datetime":"2024-01-05T10:00:00Z","exchange":"KRAKEN","symbol":"PF_XBTUSD",
             "marketType":"FUTURES","netPnlUsd":3.5,"tradeKey":"k1"}]}"#;
        let report = ingest_snapshot(&mut store, json).unwrap();
        assert_eq!(report.format, SourceFormat::RemoteSnapshot);
        assert_eq!(report.cursor.as_deref(), Some("2024-01-06T00:00:00Z"));
        assert_eq!(store.get("KRAKEN|k1").map(|e| e.net_pnl), Some(3.5));
    }

    #[test]
    fn broken_snapshot_is_an_import_error() {
        let mut store = LedgerStore::new();
        assert!(matches!(
            ingest_snapshot(&mut store, "{}"),
            Err(ImportError::Snapshot(_))
        ));
    }
}
