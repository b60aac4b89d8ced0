use models::CanonicalLedgerEntry;
use serde::Serialize;
use std::collections::HashMap;

/// Baselines smaller than this are treated as absent.
const MIN_BASELINE: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub net: f64,
    pub fees: f64,
    pub funding: f64,
    pub wins: usize,
    pub losses: usize,
    pub count: usize,
    /// `wins / count`; 0 for an empty input. Zero-net entries count toward
    /// `count` but are neither wins nor losses.
    pub win_rate: f64,
}

pub fn kpis(entries: &[CanonicalLedgerEntry]) -> Kpis {
    let mut k = Kpis::default();
    for e in entries {
        k.net += e.net_pnl;
        k.fees += e.fees;
        k.funding += e.funding;
        k.count += 1;
        if e.net_pnl > 0.0 {
            k.wins += 1;
        } else if e.net_pnl < 0.0 {
            k.losses += 1;
        }
    }
    if k.count > 0 {
        k.win_rate = k.wins as f64 / k.count as f64;
    }
    k
}

/// `net` as a percentage of the deposit baseline. `None` means unavailable.
pub fn percent_of_base(net: f64, baseline: Option<f64>) -> Option<f64> {
    let base = baseline.filter(|b| b.is_finite() && b.abs() >= MIN_BASELINE)?;
    Some(net / base * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolBreakdown {
    pub symbol: String,
    pub net: f64,
    pub fees: f64,
    pub count: usize,
}

/// Per-symbol totals, best performer first. Equal nets fall back to symbol order.
pub fn by_symbol(entries: &[CanonicalLedgerEntry]) -> Vec<SymbolBreakdown> {
    let mut map: HashMap<&str, SymbolBreakdown> = HashMap::new();
    for e in entries {
        let row = map.entry(e.symbol.as_str()).or_insert_with(|| SymbolBreakdown {
            symbol: e.symbol.clone(),
            net: 0.0,
            fees: 0.0,
            count: 0,
        });
        row.net += e.net_pnl;
        row.fees += e.fees;
        row.count += 1;
    }
    let mut out: Vec<SymbolBreakdown> = map.into_values().collect();
    out.sort_by(|a, b| b.net.total_cmp(&a.net).then_with(|| a.symbol.cmp(&b.symbol)));
    out
}
