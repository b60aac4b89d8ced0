use chrono::{DateTime, Utc};
use models::{CanonicalLedgerEntry, Exchange, MarketType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics about a ledger upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Keys that were not in the store before.
    pub added: usize,
    /// Keys already present; the stored entry was replaced.
    pub skipped: usize,
    /// Entries refused by validation.
    pub rejected: usize,
    pub total: usize,
}

/// Keyed ledger: entries live in an arena, addressed through a key index.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    entries: Vec<CanonicalLedgerEntry>,
    index: HashMap<String, usize>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from persisted entries. Later duplicates of a key win.
    pub fn from_entries(entries: Vec<CanonicalLedgerEntry>) -> Self {
        let mut store = Self::new();
        store.upsert_many(entries);
        store
    }

    /// Inserts new keys and replaces existing ones wholesale (last write wins).
    ///
    /// Every entry is validated before the batch is committed; invalid entries
    /// are counted in `rejected` and the rest still land.
    pub fn upsert_many(&mut self, batch: Vec<CanonicalLedgerEntry>) -> MergeStats {
        let mut stats = MergeStats {
            total: batch.len(),
            ..MergeStats::default()
        };

        let valid: Vec<CanonicalLedgerEntry> = batch
            .into_iter()
            .filter(|e| {
                let ok = is_valid(e);
                if !ok {
                    tracing::debug!(key = %e.key, "rejecting invalid ledger entry");
                    stats.rejected += 1;
                }
                ok
            })
            .collect();

        for entry in valid {
            match self.index.get(&entry.key) {
                Some(&slot) => {
                    self.entries[slot] = entry;
                    stats.skipped += 1;
                }
                None => {
                    self.index.insert(entry.key.clone(), self.entries.len());
                    self.entries.push(entry);
                    stats.added += 1;
                }
            }
        }

        stats
    }

    pub fn get(&self, key: &str) -> Option<&CanonicalLedgerEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Entries matching an arbitrary predicate, in no guaranteed order.
    pub fn query<F>(&self, predicate: F) -> Vec<CanonicalLedgerEntry>
    where
        F: Fn(&CanonicalLedgerEntry) -> bool,
    {
        self.entries.iter().filter(|e| predicate(e)).cloned().collect()
    }

    pub fn query_by_filter(&self, filter: &LedgerFilter) -> Vec<CanonicalLedgerEntry> {
        self.query(|e| filter.matches(e))
    }

    pub fn entries(&self) -> &[CanonicalLedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the store. Irreversible.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn totals(&self) -> LedgerTotals {
        self.entries.iter().fold(LedgerTotals::default(), |mut t, e| {
            t.net += e.net_pnl;
            t.fees += e.fees;
            t.funding += e.funding;
            t.count += 1;
            t
        })
    }
}

fn is_valid(e: &CanonicalLedgerEntry) -> bool {
    !e.key.trim().is_empty()
        && [e.quantity, e.price, e.realized_pnl, e.fees, e.funding, e.net_pnl]
            .iter()
            .all(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerTotals {
    pub net: f64,
    pub fees: f64,
    pub funding: f64,
    pub count: usize,
}

/// Composable store filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    pub exchange: Option<Exchange>,
    pub market_type: Option<MarketType>,
    /// Case-insensitive substring over symbol, notes and key.
    pub search: Option<String>,
}

impl LedgerFilter {
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn exchange(mut self, exchange: Exchange) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn market_type(mut self, market_type: MarketType) -> Self {
        self.market_type = Some(market_type);
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.search = if needle.trim().is_empty() {
            None
        } else {
            Some(needle)
        };
        self
    }

    pub fn matches(&self, e: &CanonicalLedgerEntry) -> bool {
        if let Some(since) = self.since {
            if e.timestamp < since {
                return false;
            }
        }
        if let Some(ex) = &self.exchange {
            if &e.exchange != ex {
                return false;
            }
        }
        if let Some(mt) = self.market_type {
            if e.market_type != mt {
                return false;
            }
        }
        if let Some(q) = &self.search {
            let q = q.trim().to_lowercase();
            let hit = e.symbol.to_lowercase().contains(&q)
                || e.notes.to_lowercase().contains(&q)
                || e.key.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use models::LedgerDraft;

    fn entry(key: &str, day: u32, net: f64) -> CanonicalLedgerEntry {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        LedgerDraft::derived(ts, Exchange::Kraken, MarketType::Futures, "PF_XBTUSD", "BUY", net, 0.0, 0.0)
            .with_notes("futures trade")
            .into_entry(key.to_string())
    }

    #[test]
    fn upsert_counts_added_and_replaced() {
        let mut store = LedgerStore::new();
        let s1 = store.upsert_many(vec![entry("a", 1, 1.0), entry("b", 2, 2.0)]);
        assert_eq!((s1.added, s1.skipped, s1.total), (2, 0, 2));

        let s2 = store.upsert_many(vec![entry("a", 1, 5.0), entry("c", 3, 3.0)]);
        assert_eq!((s2.added, s2.skipped), (1, 1));
        assert_eq!(store.len(), 3);
        // Replaced, not merged.
        assert_eq!(store.get("a").unwrap().net_pnl, 5.0);
    }

    #[test]
    fn invalid_entries_do_not_block_the_batch() {
        let mut store = LedgerStore::new();
        let mut bad = entry("x", 1, 1.0);
        bad.net_pnl = f64::NAN;
        let stats = store.upsert_many(vec![bad, entry("", 1, 1.0), entry("ok", 1, 1.0)]);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.added, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resync_is_noop_on_totals() {
        let batch = vec![entry("a", 1, 1.5), entry("b", 2, -0.5)];
        let mut store = LedgerStore::new();
        store.upsert_many(batch.clone());
        let before = store.totals();
        let again = store.upsert_many(batch);
        assert_eq!(again.added, 0);
        assert_eq!(store.totals(), before);
    }

    #[test]
    fn filters_compose() {
        let mut store = LedgerStore::new();
        let mut spot = entry("s", 5, 1.0);
        spot.market_type = MarketType::Spot;
        spot.symbol = "ETHUSD".into();
        store.upsert_many(vec![entry("a", 1, 1.0), entry("b", 3, 2.0), spot]);

        let since = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        assert_eq!(store.query_by_filter(&LedgerFilter::default().since(since)).len(), 2);
        assert_eq!(
            store
                .query_by_filter(&LedgerFilter::default().market_type(MarketType::Futures))
                .len(),
            2
        );
        assert_eq!(store.query_by_filter(&LedgerFilter::default().search("eth")).len(), 1);
        assert_eq!(store.query_by_filter(&LedgerFilter::default().exchange(Exchange::Blofin)).len(), 0);
        assert_eq!(store.query(|e| e.net_pnl > 1.5).len(), 1);
    }

    #[test]
    fn clear_empties_index_too() {
        let mut store = LedgerStore::from_entries(vec![entry("a", 1, 1.0)]);
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("a").is_none());
        assert_eq!(store.upsert_many(vec![entry("a", 1, 1.0)]).added, 1);
    }
}
