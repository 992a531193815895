//! Input bundle for one evaluation, as read from JSON.

use crate::error::Result;
use crate::models::{MarketSnapshot, PurchaseHistory, TaxLot};
use crate::plan::{build_plan, HarvestPlan};
use crate::policy::PolicyStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub lots: Vec<TaxLot>,
    #[serde(default)]
    pub prices: MarketSnapshot,
    #[serde(default)]
    pub purchases: PurchaseHistory,
    #[serde(default)]
    pub policy: PolicyStore,
}

impl Snapshot {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn build_plan(&self, evaluation_date: NaiveDate) -> Result<HarvestPlan> {
        build_plan(
            &self.lots,
            &self.prices,
            &self.purchases,
            &self.policy,
            &self.policy.clusters,
            evaluation_date,
        )
    }
}
