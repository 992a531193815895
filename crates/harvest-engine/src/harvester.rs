//! Harvest Candidate Selection
//!
//! Finds lots sitting on a loss large enough to be worth harvesting.

use crate::error::Diagnostic;
use crate::models::{MarketSnapshot, TaxLot};
use crate::policy::HarvestPolicy;
use serde::{Deserialize, Serialize};

/// Which threshold a candidate cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// Dollar loss meets the minimum
    LossAmount,
    /// Percentage loss meets the minimum
    LossPercentage,
    /// Both thresholds met
    Both,
}

impl Eligibility {
    fn from_thresholds(meets_amount: bool, meets_percentage: bool) -> Option<Self> {
        match (meets_amount, meets_percentage) {
            (true, true) => Some(Self::Both),
            (true, false) => Some(Self::LossAmount),
            (false, true) => Some(Self::LossPercentage),
            (false, false) => None,
        }
    }
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eligibility::LossAmount => write!(f, "loss amount"),
            Eligibility::LossPercentage => write!(f, "loss percentage"),
            Eligibility::Both => write!(f, "loss amount and percentage"),
        }
    }
}

/// A lot whose unrealized loss clears the policy thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestCandidate {
    pub lot: TaxLot,
    /// Price used for the evaluation
    pub current_price: f64,
    /// Unrealized gain/loss (negative for every candidate)
    pub unrealized: f64,
    /// Unrealized loss as a positive amount
    pub loss_amount: f64,
    /// Loss as a fraction of total cost basis
    pub loss_percentage: f64,
    pub eligibility: Eligibility,
}

impl HarvestCandidate {
    pub fn proceeds(&self) -> f64 {
        self.lot.quantity * self.current_price
    }
}

/// Ordered candidates plus the lots that could not be evaluated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSelection {
    pub candidates: Vec<HarvestCandidate>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluate a single lot. `Ok(None)` means the lot is fine but not a loss
/// worth harvesting.
pub fn evaluate_lot(
    lot: &TaxLot,
    market: &MarketSnapshot,
    policy: &HarvestPolicy,
) -> Result<Option<HarvestCandidate>, Diagnostic> {
    lot.validate().map_err(|e| Diagnostic::InvalidInput {
        lot_id: lot.id.clone(),
        message: e.to_string(),
    })?;

    let quote = market.get(&lot.security_id).ok_or_else(|| Diagnostic::MissingPrice {
        lot_id: lot.id.clone(),
        security_id: lot.security_id.clone(),
    })?;
    quote.validate().map_err(|e| Diagnostic::InvalidInput {
        lot_id: lot.id.clone(),
        message: format!("{} quote: {}", lot.security_id, e),
    })?;

    let unrealized = lot.unrealized_gain_loss(quote.price);

    // Skip if not a loss
    if unrealized >= 0.0 {
        return Ok(None);
    }

    let loss_amount = unrealized.abs();
    let loss_percentage = loss_amount / lot.total_cost_basis();

    let eligibility = Eligibility::from_thresholds(
        loss_amount >= policy.min_loss_amount,
        loss_percentage >= policy.min_loss_percentage,
    );

    Ok(eligibility.map(|eligibility| HarvestCandidate {
        lot: lot.clone(),
        current_price: quote.price,
        unrealized,
        loss_amount,
        loss_percentage,
        eligibility,
    }))
}

/// Scan lots for harvestable losses, largest loss first
pub fn select_candidates(
    lots: &[TaxLot],
    market: &MarketSnapshot,
    policy: &HarvestPolicy,
) -> CandidateSelection {
    let mut selection = CandidateSelection::default();

    for lot in lots {
        match evaluate_lot(lot, market, policy) {
            Ok(Some(candidate)) => {
                tracing::debug!(
                    lot_id = %lot.id,
                    security = %lot.security_id,
                    loss = candidate.loss_amount,
                    "lot qualifies on {}",
                    candidate.eligibility
                );
                selection.candidates.push(candidate);
            }
            Ok(None) => {}
            Err(diagnostic) => {
                tracing::warn!("{}", diagnostic);
                selection.diagnostics.push(diagnostic);
            }
        }
    }

    // Largest loss first, ties by lot id
    selection.candidates.sort_by(|a, b| {
        b.loss_amount
            .total_cmp(&a.loss_amount)
            .then_with(|| a.lot.id.cmp(&b.lot.id))
    });

    selection
}
