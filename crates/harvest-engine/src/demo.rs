//! Demo Portfolio
//!
//! A small mixed portfolio, dated relative to the evaluation date so the
//! same outcome reproduces on any day: two lots blocked by recent buys, four
//! harvestable with replacements.

use crate::error::Result;
use crate::models::{MarketSnapshot, PurchaseEvent, PurchaseHistory, TaxLot};
use crate::policy::PolicyStore;
use crate::snapshot::Snapshot;
use chrono::{Duration, NaiveDate, NaiveTime};

const DEMO_LOTS: &[(&str, f64, i64, f64)] = &[
    // security, quantity, days held, cost basis per unit
    ("SPY", 50.0, 120, 520.00),
    ("QQQ", 30.0, 90, 480.00),
    ("AAPL", 40.0, 400, 195.00),
    ("TSLA", 20.0, 70, 270.00),
    ("NVDA", 10.0, 50, 130.00),
    ("VTI", 60.0, 200, 260.00),
];

const DEMO_RECENT_BUYS: &[(&str, f64, i64)] = &[
    // security, quantity, days ago
    ("VOO", 5.0, 15),
    ("AAPL", 5.0, 15),
];

const DEMO_PRICES: &[(&str, f64)] = &[
    ("SPY", 500.00),
    ("IVV", 500.10),
    ("VOO", 499.90),
    ("VTI", 250.00),
    ("ITOT", 248.50),
    ("SCHB", 249.75),
    ("SCHX", 52.00),
    ("VTV", 160.00),
    ("SCHF", 36.00),
    ("QQQ", 455.00),
    ("QQQM", 354.00),
    ("SCHG", 77.00),
    ("XLK", 225.00),
    ("IYW", 120.00),
    ("AAPL", 178.00),
    ("VGT", 540.00),
    ("TSLA", 245.00),
    ("XLY", 180.00),
    ("CARZ", 52.00),
    ("DRIV", 28.00),
    ("NVDA", 115.00),
    ("SOXX", 210.00),
    ("SMH", 195.00),
];

/// Demo inputs with the demo policy, as of `evaluation_date`
pub fn snapshot(evaluation_date: NaiveDate) -> Result<Snapshot> {
    let lots = DEMO_LOTS
        .iter()
        .enumerate()
        .map(|(i, &(security, quantity, days_held, basis))| {
            TaxLot::new(
                format!("{}-{}", security, i + 1),
                security,
                quantity,
                basis,
                evaluation_date - Duration::days(days_held),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let purchases = DEMO_RECENT_BUYS
        .iter()
        .map(|&(security, quantity, days_ago)| {
            PurchaseEvent::new(security, evaluation_date - Duration::days(days_ago), quantity)
        })
        .collect::<Result<Vec<_>>>()?;

    let as_of = evaluation_date.and_time(NaiveTime::MIN).and_utc();
    let prices = MarketSnapshot::from_prices(DEMO_PRICES.iter().copied(), as_of)?;

    Ok(Snapshot {
        lots,
        prices,
        purchases: PurchaseHistory::new(purchases),
        policy: PolicyStore::demo(),
    })
}
