//! Harvest Plan Builder
//!
//! Runs candidate selection, the wash-sale check and replacement resolution
//! for every candidate and rolls the outcome up into a plan.

use crate::error::{Diagnostic, HarvestError, Result};
use crate::harvester::{select_candidates, Eligibility, HarvestCandidate};
use crate::models::{MarketSnapshot, PurchaseHistory, Security, TaxLot};
use crate::policy::{ClusterMap, PolicyStore};
use crate::substitutes::resolve_replacement;
use crate::wash_sale::{earliest_triggering_purchase, WashSaleWindow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reason attached to an actionable sale with nothing to buy back
pub const NO_REPLACEMENT_REASON: &str = "no eligible replacement";

/// Replacement quantities are rounded down to this many decimals
const QUANTITY_DECIMALS: i32 = 6;

/// The lot an action sells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRef {
    pub lot_id: String,
    pub security_id: String,
    pub quantity: f64,
}

impl From<&TaxLot> for LotRef {
    fn from(lot: &TaxLot) -> Self {
        Self {
            lot_id: lot.id.clone(),
            security_id: lot.security_id.clone(),
            quantity: lot.quantity,
        }
    }
}

/// One proposed sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestAction {
    pub lot: LotRef,
    pub sale_date: NaiveDate,
    pub sale_price: f64,
    /// Loss realized by the sale (positive number)
    pub estimated_loss: f64,
    pub loss_percentage: f64,
    pub eligibility: Eligibility,
    pub blocked: bool,
    pub reason: Option<String>,
    /// Purchase that blocks the sale
    pub triggering_purchase_date: Option<NaiveDate>,
    pub replacement: Option<Security>,
    pub replacement_price: Option<f64>,
    pub replacement_quantity: Option<f64>,
    /// Earliest date the sold security can be bought back
    pub reentry_date: NaiveDate,
}

impl HarvestAction {
    pub fn is_actionable(&self) -> bool {
        !self.blocked
    }

    pub fn proceeds(&self) -> f64 {
        self.lot.quantity * self.sale_price
    }

    pub fn replacement_cost(&self) -> f64 {
        match (self.replacement_quantity, self.replacement_price) {
            (Some(qty), Some(price)) => qty * price,
            _ => 0.0,
        }
    }
}

/// Aggregates over a plan's actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanTotals {
    /// Losses of actions that are not blocked
    pub total_actionable_loss: f64,
    /// Losses that a wash sale would disallow
    pub blocked_loss: f64,
    pub count_blocked: usize,
    pub count_actionable: usize,
    pub count_no_replacement: usize,
    /// Sale proceeds minus replacement cost over actionable actions
    pub simulated_cash_delta: f64,
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestPlan {
    pub evaluation_date: NaiveDate,
    pub actions: Vec<HarvestAction>,
    pub totals: PlanTotals,
    pub diagnostics: Vec<Diagnostic>,
}

impl HarvestPlan {
    pub fn actionable(&self) -> impl Iterator<Item = &HarvestAction> {
        self.actions.iter().filter(|a| a.is_actionable())
    }

    pub fn blocked(&self) -> impl Iterator<Item = &HarvestAction> {
        self.actions.iter().filter(|a| a.blocked)
    }

    /// Check the rules every plan must satisfy: an unblocked sale never buys
    /// back into its own cluster and never re-enters inside the window.
    pub fn verify(&self, clusters: &ClusterMap) -> Result<()> {
        for action in &self.actions {
            let replacement = action.replacement.as_ref().filter(|_| !action.blocked);
            if let Some(replacement) = replacement {
                if clusters.same_cluster(&action.lot.security_id, &replacement.id) {
                    return Err(HarvestError::Invariant(format!(
                        "lot {} replaced by substantially identical {}",
                        action.lot.lot_id, replacement.id
                    )));
                }
            }
            if action.reentry_date <= WashSaleWindow::around(action.sale_date).window_end {
                return Err(HarvestError::Invariant(format!(
                    "lot {} re-entry date {} falls inside the wash-sale window",
                    action.lot.lot_id, action.reentry_date
                )));
            }
        }
        Ok(())
    }
}

fn round_down(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).floor() / factor
}

/// Turn one candidate into an action
fn plan_action(
    candidate: &HarvestCandidate,
    market: &MarketSnapshot,
    purchase_history: &PurchaseHistory,
    policy: &PolicyStore,
    clusters: &ClusterMap,
    evaluation_date: NaiveDate,
) -> Result<HarvestAction> {
    let lot = &candidate.lot;
    let sale_date = Some(evaluation_date);

    let mut action = HarvestAction {
        lot: LotRef::from(lot),
        sale_date: evaluation_date,
        sale_price: candidate.current_price,
        estimated_loss: candidate.loss_amount,
        loss_percentage: candidate.loss_percentage,
        eligibility: candidate.eligibility,
        blocked: false,
        reason: None,
        triggering_purchase_date: None,
        replacement: None,
        replacement_price: None,
        replacement_quantity: None,
        reentry_date: WashSaleWindow::around(evaluation_date).safe_repurchase_date(),
    };

    if let Some(purchase) =
        earliest_triggering_purchase(&lot.security_id, sale_date, purchase_history, clusters)?
    {
        tracing::debug!(
            lot_id = %lot.id,
            security = %lot.security_id,
            purchase = %purchase.security_id,
            "blocked by purchase on {}",
            purchase.date
        );
        action.blocked = true;
        action.reason = Some(format!("wash sale: purchase on {}", purchase.date));
        action.triggering_purchase_date = Some(purchase.date);
        return Ok(action);
    }

    match resolve_replacement(&lot.security_id, policy, purchase_history, clusters, sale_date)? {
        Some(replacement) => {
            if let Some(price) = market.price(&replacement.id).filter(|p| *p > 0.0) {
                action.replacement_price = Some(price);
                action.replacement_quantity =
                    Some(round_down(candidate.proceeds() / price, QUANTITY_DECIMALS));
            }
            action.replacement = Some(replacement);
        }
        None => {
            action.reason = Some(NO_REPLACEMENT_REASON.to_string());
        }
    }

    Ok(action)
}

/// Purchase events that fail validation and so never count toward a wash sale
fn purchase_diagnostics(purchase_history: &PurchaseHistory) -> Vec<Diagnostic> {
    purchase_history
        .iter()
        .filter_map(|event| {
            let err = event.validate().err()?;
            tracing::warn!(security = %event.security_id, date = %event.date, "{}", err);
            Some(Diagnostic::InvalidPurchase {
                security_id: event.security_id.clone(),
                date: event.date,
                message: err.to_string(),
            })
        })
        .collect()
}

/// Priced securities the policy knows nothing about, whether or not the lot
/// is currently a loss
fn policy_gaps(
    lots: &[TaxLot],
    market: &MarketSnapshot,
    policy: &PolicyStore,
    clusters: &ClusterMap,
) -> Vec<Diagnostic> {
    let uncovered: BTreeSet<&str> = lots
        .iter()
        .map(|lot| lot.security_id.as_str())
        .filter(|id| !id.trim().is_empty() && market.get(id).is_some())
        .filter(|id| !policy.has_coverage(id, clusters))
        .collect();

    uncovered
        .into_iter()
        .map(|security_id| {
            tracing::warn!(
                security = %security_id,
                "no cluster or replacement policy; treating as singleton"
            );
            Diagnostic::PolicyGap {
                security_id: security_id.to_string(),
            }
        })
        .collect()
}

/// Build the harvest plan for a portfolio snapshot as of `evaluation_date`
pub fn build_plan(
    lots: &[TaxLot],
    market: &MarketSnapshot,
    purchase_history: &PurchaseHistory,
    policy: &PolicyStore,
    clusters: &ClusterMap,
    evaluation_date: NaiveDate,
) -> Result<HarvestPlan> {
    policy.validate()?;

    let selection = select_candidates(lots, market, &policy.policy);
    let mut diagnostics = selection.diagnostics;
    diagnostics.extend(purchase_diagnostics(purchase_history));
    diagnostics.extend(policy_gaps(lots, market, policy, clusters));

    let mut actions = Vec::with_capacity(selection.candidates.len());
    let mut totals = PlanTotals::default();

    for candidate in &selection.candidates {
        let action = plan_action(
            candidate,
            market,
            purchase_history,
            policy,
            clusters,
            evaluation_date,
        )?;

        if action.blocked {
            totals.count_blocked += 1;
            totals.blocked_loss += action.estimated_loss;
        } else {
            totals.count_actionable += 1;
            totals.total_actionable_loss += action.estimated_loss;
            totals.simulated_cash_delta += action.proceeds() - action.replacement_cost();
            if action.replacement.is_none() {
                totals.count_no_replacement += 1;
            }
        }

        actions.push(action);
    }

    let plan = HarvestPlan {
        evaluation_date,
        actions,
        totals,
        diagnostics,
    };
    plan.verify(clusters)?;

    tracing::info!(
        actionable = plan.totals.count_actionable,
        blocked = plan.totals.count_blocked,
        no_replacement = plan.totals.count_no_replacement,
        diagnostics = plan.diagnostics.len(),
        "harvestable loss ${:.2}",
        plan.totals.total_actionable_loss
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PurchaseEvent;
    use crate::policy::WashSaleCluster;
    use chrono::{Duration, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn spy_lot() -> Vec<TaxLot> {
        vec![TaxLot::new("spy-1", "SPY", 10.0, 520.0, date(2024, 3, 1)).unwrap()]
    }

    fn prices(quotes: &[(&str, f64)]) -> MarketSnapshot {
        MarketSnapshot::from_prices(quotes.iter().copied(), Utc::now()).unwrap()
    }

    fn demo_plan(
        lots: &[TaxLot],
        market: &MarketSnapshot,
        history: &PurchaseHistory,
        today: NaiveDate,
    ) -> HarvestPlan {
        let store = PolicyStore::demo();
        build_plan(lots, market, history, &store, &store.clusters, today).unwrap()
    }

    #[test]
    fn test_blocked_action_has_no_replacement() {
        let today = date(2024, 11, 20);
        let market = prices(&[("SPY", 500.0), ("VTI", 250.0)]);
        let history = PurchaseHistory::new(vec![
            PurchaseEvent::new("VOO", today - Duration::days(15), 5.0).unwrap(),
        ]);

        let plan = demo_plan(&spy_lot(), &market, &history, today);

        let action = &plan.actions[0];
        assert!(action.blocked);
        assert_eq!(action.reason.as_deref(), Some("wash sale: purchase on 2024-11-05"));
        assert_eq!(action.replacement, None);
        assert_eq!(plan.totals.count_blocked, 1);
        assert_eq!(plan.totals.total_actionable_loss, 0.0);
        assert!((plan.totals.blocked_loss - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_purchase_is_reported_not_blocking() {
        let today = date(2024, 11, 20);
        let market = prices(&[("SPY", 500.0), ("VTI", 250.0)]);
        let history = PurchaseHistory::new(vec![PurchaseEvent {
            security_id: "VOO".to_string(),
            date: today - Duration::days(5),
            quantity: -5.0,
        }]);

        let plan = demo_plan(&spy_lot(), &market, &history, today);

        let action = &plan.actions[0];
        assert!(!action.blocked);
        assert_eq!(action.triggering_purchase_date, None);
        assert_eq!(action.replacement.as_ref().map(|s| s.id.as_str()), Some("VTI"));
        assert_eq!(plan.diagnostics.len(), 1);
        assert!(matches!(
            plan.diagnostics[0],
            Diagnostic::InvalidPurchase { ref security_id, date: bought, .. }
                if security_id == "VOO" && bought == today - Duration::days(5)
        ));
    }

    #[test]
    fn test_replacement_is_sized_from_proceeds() {
        let today = date(2024, 11, 20);
        let market = prices(&[("SPY", 500.0), ("VTI", 250.0)]);

        let plan = demo_plan(&spy_lot(), &market, &PurchaseHistory::default(), today);

        let action = &plan.actions[0];
        assert!(!action.blocked);
        assert_eq!(action.replacement.as_ref().map(|s| s.id.as_str()), Some("VTI"));
        assert_eq!(action.replacement_quantity, Some(20.0));
        assert_eq!(action.reentry_date, date(2024, 12, 21));
        assert!(plan.totals.simulated_cash_delta.abs() < 1e-6);
    }

    #[test]
    fn test_unpriced_replacement_keeps_cash() {
        let today = date(2024, 11, 20);
        let market = prices(&[("SPY", 500.0)]);

        let plan = demo_plan(&spy_lot(), &market, &PurchaseHistory::default(), today);

        let action = &plan.actions[0];
        assert_eq!(action.replacement.as_ref().map(|s| s.id.as_str()), Some("VTI"));
        assert_eq!(action.replacement_quantity, None);
        assert!((plan.totals.simulated_cash_delta - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_gap_reported_once() {
        let today = date(2024, 11, 20);
        let lots = vec![
            TaxLot::new("msft-1", "MSFT", 10.0, 400.0, date(2024, 3, 1)).unwrap(),
            TaxLot::new("msft-2", "MSFT", 5.0, 420.0, date(2024, 4, 1)).unwrap(),
        ];
        let market = prices(&[("MSFT", 350.0)]);

        let plan = demo_plan(&lots, &market, &PurchaseHistory::default(), today);

        assert_eq!(plan.totals.count_no_replacement, 2);
        let gaps: Vec<_> = plan
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::PolicyGap { .. }))
            .collect();
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn test_policy_gap_covers_lots_held_at_a_gain() {
        let today = date(2024, 11, 20);
        let lots = vec![
            TaxLot::new("msft-1", "MSFT", 10.0, 300.0, date(2024, 3, 1)).unwrap(),
            TaxLot::new("spy-1", "SPY", 10.0, 400.0, date(2024, 3, 1)).unwrap(),
            // Unpriced lots get MissingPrice instead
            TaxLot::new("gme-1", "GME", 10.0, 20.0, date(2024, 3, 1)).unwrap(),
        ];
        let market = prices(&[("MSFT", 350.0), ("SPY", 500.0)]);

        let plan = demo_plan(&lots, &market, &PurchaseHistory::default(), today);

        assert!(plan.actions.is_empty());
        assert_eq!(
            plan.diagnostics,
            vec![
                Diagnostic::MissingPrice {
                    lot_id: "gme-1".to_string(),
                    security_id: "GME".to_string(),
                },
                Diagnostic::PolicyGap {
                    security_id: "MSFT".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_explicit_clusters_drive_coverage() {
        let today = date(2024, 11, 20);
        let store = PolicyStore::demo();
        let lots = vec![TaxLot::new("msft-1", "MSFT", 10.0, 400.0, date(2024, 3, 1)).unwrap()];
        let market = prices(&[("MSFT", 350.0)]);
        let clusters = ClusterMap::new(vec![WashSaleCluster::new(["MSFT", "XLK"])]).unwrap();

        let history = PurchaseHistory::default();
        let plan = build_plan(&lots, &market, &history, &store, &clusters, today).unwrap();

        assert!(!plan
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::PolicyGap { .. })));
    }

    #[test]
    fn test_verify_rejects_identical_replacement() {
        let store = PolicyStore::demo();
        let today = date(2024, 11, 20);
        let plan = HarvestPlan {
            evaluation_date: today,
            actions: vec![HarvestAction {
                lot: LotRef {
                    lot_id: "spy-1".to_string(),
                    security_id: "SPY".to_string(),
                    quantity: 1.0,
                },
                sale_date: today,
                sale_price: 500.0,
                estimated_loss: 20.0,
                loss_percentage: 0.04,
                eligibility: Eligibility::LossPercentage,
                blocked: false,
                reason: None,
                triggering_purchase_date: None,
                replacement: Some(store.security("VOO")),
                replacement_price: None,
                replacement_quantity: None,
                reentry_date: today + Duration::days(31),
            }],
            totals: PlanTotals::default(),
            diagnostics: Vec::new(),
        };

        assert!(matches!(plan.verify(&store.clusters), Err(HarvestError::Invariant(_))));
    }

    #[test]
    fn test_invalid_policy_fails_plan() {
        let mut store = PolicyStore::demo();
        store.policy.min_loss_percentage = 2.0;
        let market = MarketSnapshot::new();
        let history = PurchaseHistory::default();

        let result = build_plan(&[], &market, &history, &store, &store.clusters, date(2024, 1, 1));
        assert!(matches!(result, Err(HarvestError::Policy(_))));
    }
}
