//! harvest: evaluate a portfolio snapshot for tax-loss harvesting.
//!
//! Usage:
//!   cargo run -p harvest-cli                                  # demo portfolio, today
//!   cargo run -p harvest-cli -- --snapshot portfolio.json --json
//!   cargo run -p harvest-cli -- --demo --date 2024-12-15
//!
//! Settings also come from the environment (or `.env`): HARVEST_SNAPSHOT,
//! HARVEST_EVALUATION_DATE, HARVEST_OUTPUT, HARVEST_MIN_LOSS_AMOUNT,
//! HARVEST_MIN_LOSS_PCT.

mod config;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use config::{CliConfig, OutputFormat};
use harvest_engine::{demo, PlanExplainer, Snapshot, TextExplainer};

fn load_snapshot(config: &CliConfig, evaluation_date: NaiveDate) -> anyhow::Result<Snapshot> {
    let mut snapshot = match &config.snapshot_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            Snapshot::from_json(&json)
                .with_context(|| format!("parsing snapshot {}", path.display()))?
        }
        None => {
            tracing::info!("no snapshot given, using demo portfolio");
            demo::snapshot(evaluation_date)?
        }
    };

    if let Some(amount) = config.min_loss_amount {
        snapshot.policy.policy.min_loss_amount = amount;
    }
    if let Some(pct) = config.min_loss_percentage {
        snapshot.policy.policy.min_loss_percentage = pct;
    }

    Ok(snapshot)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest=info,harvest_engine=info".into()),
        )
        .init();

    let config = CliConfig::from_env()?.apply_args(std::env::args().skip(1))?;
    let evaluation_date = config
        .evaluation_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let snapshot = load_snapshot(&config, evaluation_date)?;
    tracing::info!(
        lots = snapshot.lots.len(),
        prices = snapshot.prices.len(),
        purchases = snapshot.purchases.len(),
        "evaluating as of {}",
        evaluation_date
    );

    let plan = snapshot.build_plan(evaluation_date)?;

    match config.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => println!("{}", TextExplainer::new().explain(&plan)),
    }

    Ok(())
}
