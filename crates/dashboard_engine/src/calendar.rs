use chrono::{Datelike, Duration, NaiveDate};
use models::CanonicalLedgerEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nets inside this band are treated as zero.
pub const FLAT_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalendarGranularity {
    /// Days of the selected month.
    #[default]
    Day,
    /// ISO weeks overlapping the selected month, counting only days inside it.
    Week,
    /// Months of the selected year.
    Month,
}

impl CalendarGranularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "day" | "days" => Some(Self::Day),
            "week" | "weeks" => Some(Self::Week),
            "month" | "months" => Some(Self::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayClass {
    Gain,
    Loss,
    Flat,
}

impl DayClass {
    pub fn classify(net: f64) -> Self {
        if net > FLAT_EPSILON {
            DayClass::Gain
        } else if net < -FLAT_EPSILON {
            DayClass::Loss
        } else {
            DayClass::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarCell {
    pub key: String,
    pub net: f64,
    pub count: usize,
    pub class: DayClass,
}

/// Net per calendar period. Every period of the selected month (or year, for
/// `Month`) gets a cell, in chronological order. Returns nothing for an
/// invalid month.
pub fn calendar_aggregate(
    entries: &[CanonicalLedgerEntry],
    year: i32,
    month: u32,
    granularity: CalendarGranularity,
) -> Vec<CalendarCell> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    match granularity {
        CalendarGranularity::Month => {
            for m in 1..=12 {
                sums.insert(format!("{year:04}-{m:02}"), (0.0, 0));
            }
            for e in entries.iter().filter(|e| e.timestamp.year() == year) {
                let key = format!("{year:04}-{:02}", e.timestamp.month());
                add(&mut sums, key, e.net_pnl);
            }
        }
        CalendarGranularity::Day | CalendarGranularity::Week => {
            let Some(days) = month_days(year, month) else {
                return Vec::new();
            };
            for d in &days {
                sums.entry(period_key(*d, granularity)).or_insert((0.0, 0));
            }
            for e in entries {
                let d = e.timestamp.date_naive();
                if d.year() == year && d.month() == month {
                    add(&mut sums, period_key(d, granularity), e.net_pnl);
                }
            }
        }
    }

    // Keys are zero-padded, so lexical order is chronological within one
    // selection. ISO week keys can carry the neighbouring year ("2021-W53"
    // for early January) and sort first, which is also chronological.
    sums.into_iter()
        .map(|(key, (net, count))| CalendarCell {
            key,
            net,
            count,
            class: DayClass::classify(net),
        })
        .collect()
}

fn add(sums: &mut BTreeMap<String, (f64, usize)>, key: String, net: f64) {
    let slot = sums.entry(key).or_insert((0.0, 0));
    slot.0 += net;
    slot.1 += 1;
}

fn period_key(d: NaiveDate, granularity: CalendarGranularity) -> String {
    match granularity {
        CalendarGranularity::Day => d.format("%Y-%m-%d").to_string(),
        CalendarGranularity::Week => {
            let w = d.iso_week();
            format!("{:04}-W{:02}", w.year(), w.week())
        }
        CalendarGranularity::Month => d.format("%Y-%m").to_string(),
    }
}

fn month_days(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let n = (next - first).num_days();
    Some((0..n).map(|i| first + Duration::days(i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::entry_at;
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<CanonicalLedgerEntry> {
        vec![
            entry_at("a", Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap(), 5.0),
            entry_at("b", Utc.with_ymd_and_hms(2024, 3, 7, 18, 0, 0).unwrap(), -5.0),
            entry_at("c", Utc.with_ymd_and_hms(2024, 3, 8, 9, 0, 0).unwrap(), -2.5),
            entry_at("d", Utc.with_ymd_and_hms(2024, 3, 31, 9, 0, 0).unwrap(), 1.0),
            entry_at("e", Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(), 9.0),
        ]
    }

    #[test]
    fn classify_uses_epsilon() {
        assert_eq!(DayClass::classify(1e-8), DayClass::Flat);
        assert_eq!(DayClass::classify(-1e-8), DayClass::Flat);
        assert_eq!(DayClass::classify(0.0), DayClass::Flat);
        assert_eq!(DayClass::classify(0.01), DayClass::Gain);
        assert_eq!(DayClass::classify(-0.01), DayClass::Loss);
    }

    #[test]
    fn day_granularity_covers_whole_month() {
        let cells = calendar_aggregate(&sample(), 2024, 3, CalendarGranularity::Day);
        assert_eq!(cells.len(), 31);
        let day7 = cells.iter().find(|c| c.key == "2024-03-07").unwrap();
        assert_eq!(day7.count, 2);
        assert_eq!(day7.class, DayClass::Flat);
        let day8 = cells.iter().find(|c| c.key == "2024-03-08").unwrap();
        assert_eq!(day8.class, DayClass::Loss);
        assert_eq!(cells.last().unwrap().key, "2024-03-31");
        let total: f64 = cells.iter().map(|c| c.net).sum();
        assert!((total - (-1.5)).abs() < 1e-9);
    }

    #[test]
    fn week_granularity_intersects_month() {
        let cells = calendar_aggregate(&sample(), 2024, 3, CalendarGranularity::Week);
        // March 2024 runs from Friday W09 to Sunday W13.
        let keys: Vec<_> = cells.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-W09", "2024-W10", "2024-W11", "2024-W12", "2024-W13"]);
        let w10 = &cells[1];
        assert!((w10.net - (-2.5)).abs() < 1e-9);
        // 2024-04-01 is in W14 and outside the month.
        assert_eq!(cells[4].net, 1.0);
    }

    #[test]
    fn week_keys_use_iso_year() {
        let es = vec![entry_at("x", Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap(), 3.0)];
        let cells = calendar_aggregate(&es, 2021, 1, CalendarGranularity::Week);
        assert_eq!(cells[0].key, "2020-W53");
        assert_eq!(cells[0].net, 3.0);
    }

    #[test]
    fn month_granularity_spans_year() {
        let cells = calendar_aggregate(&sample(), 2024, 3, CalendarGranularity::Month);
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[2].key, "2024-03");
        assert_eq!(cells[2].count, 4);
        assert_eq!(cells[3].net, 9.0);
        assert_eq!(cells[0].class, DayClass::Flat);
    }

    #[test]
    fn invalid_month_is_empty() {
        assert!(calendar_aggregate(&sample(), 2024, 13, CalendarGranularity::Day).is_empty());
        assert_eq!(CalendarGranularity::parse("Week"), Some(CalendarGranularity::Week));
        assert_eq!(CalendarGranularity::parse("fortnight"), None);
    }
}
