use anyhow::{Result, anyhow};
use clap::Parser;
use cli::LedgerArgs;

#[derive(Parser, Debug)]
#[command(
    name = "set-baseline",
    about = "Set the deposit baseline used as the denominator for percentage figures."
)]
struct Args {
    /// Exchange name, or "all" for the combined baseline
    scope: String,

    /// Cumulative net deposits, in the ledger's base currency
    #[arg(allow_hyphen_values = true)]
    amount: f64,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !args.amount.is_finite() {
        return Err(anyhow!("baseline must be a finite number"));
    }
    let mut ledger = args.ledger.open()?;
    ledger.db.deposit_baselines.set(&args.scope, args.amount);
    ledger.save()?;
    println!(
        "Baseline for {} set to {} {}",
        args.scope.trim(),
        args.amount,
        ledger.settings.base_currency
    );
    Ok(())
}
