//! Replacement Security Resolution
//!
//! Picks a security to buy after harvesting that keeps market exposure
//! without being substantially identical to what was sold.

use crate::error::{HarvestError, Result};
use crate::models::{PurchaseHistory, Security};
use crate::policy::{ClusterMap, PolicyStore};
use crate::wash_sale::would_trigger_wash_sale;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a listed replacement was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Same cluster as the security being sold
    SubstantiallyIdentical,
    /// Buying it now would itself be a wash sale
    RecentPurchase,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SubstantiallyIdentical => write!(f, "substantially identical"),
            SkipReason::RecentPurchase => write!(f, "recently purchased"),
        }
    }
}

/// Outcome of checking one listed replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementCheck {
    pub security_id: String,
    pub skipped: Option<SkipReason>,
}

/// Walk the replacement list for `security_id` and report what happened to
/// each entry, stopping at the first one that survives.
pub fn check_replacements(
    security_id: &str,
    policy: &PolicyStore,
    purchase_history: &PurchaseHistory,
    clusters: &ClusterMap,
    sale_date: Option<NaiveDate>,
) -> Result<Vec<ReplacementCheck>> {
    if sale_date.is_none() {
        return Err(HarvestError::InvalidInput("sale date is required".to_string()));
    }

    let mut checks = Vec::new();

    for candidate in policy.replacements_for(security_id, clusters) {
        let skipped = if clusters.same_cluster(security_id, candidate) {
            Some(SkipReason::SubstantiallyIdentical)
        } else if would_trigger_wash_sale(candidate, sale_date, purchase_history, clusters)? {
            Some(SkipReason::RecentPurchase)
        } else {
            None
        };

        if let Some(reason) = skipped {
            tracing::debug!(
                security = security_id,
                replacement = %candidate,
                "skipping replacement: {}",
                reason
            );
        }

        checks.push(ReplacementCheck {
            security_id: candidate.clone(),
            skipped,
        });

        if skipped.is_none() {
            break;
        }
    }

    Ok(checks)
}

/// First compliant replacement for `security_id`, if any
pub fn resolve_replacement(
    security_id: &str,
    policy: &PolicyStore,
    purchase_history: &PurchaseHistory,
    clusters: &ClusterMap,
    sale_date: Option<NaiveDate>,
) -> Result<Option<Security>> {
    let checks = check_replacements(security_id, policy, purchase_history, clusters, sale_date)?;

    Ok(checks
        .into_iter()
        .find(|c| c.skipped.is_none())
        .map(|c| policy.security(&c.security_id)))
}
