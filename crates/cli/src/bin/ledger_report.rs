use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use cli::{LedgerArgs, view_filters};
use dashboard_engine::{Dashboard, build_dashboard};
use fx_rates::{FxStatus, service_from_settings};

#[derive(Parser, Debug)]
#[command(name = "ledger-report", about = "Print KPIs and period totals for the trading ledger.")]
struct Args {
    /// Time range: all, ytd or <n>d
    #[arg(long, default_value = "all")]
    range: String,

    /// Range anchor: now or latest
    #[arg(long, default_value = "now")]
    anchor: String,

    #[arg(long)]
    exchange: Option<String>,

    /// SPOT or FUTURES
    #[arg(long)]
    market: Option<String>,

    /// Substring match over symbol, notes and key
    #[arg(long)]
    search: Option<String>,

    /// Fetch a fresh FX rate before reporting
    #[arg(long)]
    refresh_fx: bool,

    /// Print the full dashboard as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn print_report(d: &Dashboard) {
    let cur = &d.metadata.display_currency;
    println!("Range {} | {} entries | amounts in {}", d.metadata.range, d.metadata.entry_count, cur);
    println!("  net       {:>12.2}", d.kpis.net);
    println!("  fees      {:>12.2}", d.kpis.fees);
    println!("  funding   {:>12.2}", d.kpis.funding);
    println!("  win rate  {:>11.1}%  ({} wins / {} losses)", d.kpis.win_rate * 100.0, d.kpis.wins, d.kpis.losses);
    println!("  drawdown  {:>12.2}", d.max_drawdown);
    match d.percent_of_base {
        Some(p) => println!("  of base   {:>11.2}%", p),
        None => println!("  of base          n/a  (no baseline set)"),
    }

    println!("\nMonthly net");
    for b in d.monthly.iter().filter(|b| b.count > 0) {
        println!("  {}  {:>12.2}  ({} entries)", b.label, b.net, b.count);
    }

    if !d.by_symbol.is_empty() {
        println!("\nBy symbol");
        for s in &d.by_symbol {
            println!("  {:<16} {:>12.2}  ({} entries)", s.symbol, s.net, s.count);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut ledger = args.ledger.open()?;
    let filters = view_filters(
        &args.range,
        &args.anchor,
        args.exchange.as_deref(),
        args.market.as_deref(),
        args.search.clone(),
    )?;

    if args.refresh_fx {
        let fx = service_from_settings(&ledger.settings)?.with_cached(ledger.db.fx_cache.clone());
        match fx.refresh().await {
            FxStatus::Fresh { quote } => {
                eprintln!("fx: 1 {} = {} {} ({})", quote.base, quote.rate, quote.target, quote.provider);
                ledger.db.fx_cache = Some(quote);
                ledger.save()?;
            }
            FxStatus::Stale { quote, reason } => {
                eprintln!("fx: using cached rate from {} ({})", quote.as_of.to_rfc3339(), reason)
            }
            FxStatus::Unavailable { reason } => eprintln!("fx: no rate available, reporting in base currency ({})", reason),
        }
    }

    let dashboard = build_dashboard(&ledger.db.entries, &filters, &ledger.engine_context(), Utc::now());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print_report(&dashboard);
    }
    Ok(())
}
