use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use models::CanonicalLedgerEntry;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cumulative_net: f64,
}

/// Running sum of `net_pnl`. Input must already be sorted oldest first; the
/// series is rebuilt from scratch on every call.
pub fn equity_series(entries_asc: &[CanonicalLedgerEntry]) -> Vec<EquityPoint> {
    let mut running = 0.0;
    entries_asc
        .iter()
        .map(|e| {
            running += e.net_pnl;
            EquityPoint {
                timestamp: e.timestamp,
                cumulative_net: running,
            }
        })
        .collect()
}

/// Largest fall from a running peak, starting from a flat zero balance.
/// Reported as a non-negative amount.
pub fn max_drawdown(series: &[EquityPoint]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for p in series {
        peak = peak.max(p.cumulative_net);
        worst = worst.max(peak - p.cumulative_net);
    }
    worst
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucketing {
    /// One bucket per UTC calendar day over the trailing `days` days.
    Daily { days: u32 },
    /// One bucket per calendar month over the trailing `months` months.
    Monthly { months: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub start: DateTime<Utc>,
    pub label: String,
    pub net: f64,
    pub fees: f64,
    pub funding: f64,
    pub count: usize,
}

impl PeriodBucket {
    fn empty(day: NaiveDate, label: String) -> Self {
        Self {
            start: day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            label,
            net: 0.0,
            fees: 0.0,
            funding: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, e: &CanonicalLedgerEntry) {
        self.net += e.net_pnl;
        self.fees += e.fees;
        self.funding += e.funding;
        self.count += 1;
    }
}

/// Buckets ending with the one that contains `reference`, oldest first.
///
/// Every bucket in the window is present even when empty. Entries outside the
/// window are ignored.
pub fn time_buckets(
    entries: &[CanonicalLedgerEntry],
    bucketing: Bucketing,
    reference: DateTime<Utc>,
) -> Vec<PeriodBucket> {
    let today = reference.date_naive();
    match bucketing {
        Bucketing::Daily { days } => {
            let first = today
                .checked_sub_days(Days::new(u64::from(days.max(1)) - 1))
                .unwrap_or(NaiveDate::MIN);
            let span = (today - first).num_days() + 1;
            let mut buckets: Vec<PeriodBucket> = first
                .iter_days()
                .take(span as usize)
                .map(|d| PeriodBucket::empty(d, d.format("%Y-%m-%d").to_string()))
                .collect();
            for e in entries {
                let offset = (e.timestamp.date_naive() - first).num_days();
                if (0..span).contains(&offset) {
                    buckets[offset as usize].add(e);
                }
            }
            buckets
        }
        Bucketing::Monthly { months } => {
            let current = month_index(today.year(), today.month());
            let earliest = month_index(NaiveDate::MIN.year(), NaiveDate::MIN.month());
            let first = (current - i64::from(months.max(1)) + 1).max(earliest);
            let mut buckets: Vec<PeriodBucket> = (first..=current)
                .map(|idx| {
                    let (y, m) = from_month_index(idx);
                    let d = NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN);
                    PeriodBucket::empty(d, format!("{y:04}-{m:02}"))
                })
                .collect();
            for e in entries {
                let d = e.timestamp.date_naive();
                let offset = month_index(d.year(), d.month()) - first;
                if (0..=current - first).contains(&offset) {
                    buckets[offset as usize].add(e);
                }
            }
            buckets
        }
    }
}

fn month_index(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

fn from_month_index(idx: i64) -> (i32, u32) {
    (idx.div_euclid(12) as i32, (idx.rem_euclid(12) + 1) as u32)
}
