use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use dashboard_engine::{generate_dashboard, write_dashboard_json, RangeAnchor, TimeRange, ViewFilters};
use std::env;
use std::path::PathBuf;

fn arg(name: &str) -> Option<String> {
    env::args()
        .position(|a| a == name)
        .and_then(|i| env::args().nth(i + 1))
}

fn main() -> Result<()> {
    let settings_path = arg("--settings").map(PathBuf::from);
    let settings = settings_loader::load_effective_settings(settings_path.as_deref())?;
    logger::init_tracing(&settings.log_filter);

    let database = arg("--database").unwrap_or_else(|| settings.database_path.clone());
    let out = arg("--out").unwrap_or("dashboard/dashboard.json".to_string());
    let range_raw = arg("--range").unwrap_or("all".to_string());
    let anchor_raw = arg("--anchor").unwrap_or("now".to_string());

    let filters = ViewFilters {
        range: TimeRange::parse(&range_raw).ok_or_else(|| anyhow!("unknown range: {range_raw}"))?,
        anchor: RangeAnchor::parse(&anchor_raw).ok_or_else(|| anyhow!("unknown anchor: {anchor_raw}"))?,
        ..ViewFilters::default()
    };

    let database_path = PathBuf::from(&database);
    let out_path = PathBuf::from(&out);

    println!(
        "Generating dashboard...\n  database: {}\n  range   : {}\n  output  : {}",
        database_path.display(),
        filters.range.label(),
        out_path.display()
    );

    let dashboard = generate_dashboard(&database_path, &settings, &filters, Utc::now())
        .context("generate dashboard")?;
    write_dashboard_json(&dashboard, &out_path).context("write dashboard.json")?;

    println!(
        "Done. {} entries, net {} {}",
        dashboard.metadata.entry_count, dashboard.kpis.net, dashboard.metadata.display_currency
    );
    Ok(())
}
