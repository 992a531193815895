//! Harvest Engine
//!
//! Tax-loss harvesting decisions over a point-in-time portfolio snapshot:
//! loss-threshold candidate selection, wash-sale window checks across
//! substantially identical clusters, and compliant replacement securities.

pub mod demo;
pub mod error;
pub mod explain;
pub mod harvester;
pub mod models;
pub mod plan;
pub mod policy;
pub mod snapshot;
pub mod substitutes;
pub mod wash_sale;

pub use error::{Diagnostic, HarvestError, Result};
pub use explain::{PlanExplainer, TextExplainer};
pub use harvester::{
    evaluate_lot, select_candidates, CandidateSelection, Eligibility, HarvestCandidate,
};
pub use models::{
    AssetClass, MarketPrice, MarketSnapshot, PurchaseEvent, PurchaseHistory, Security, TaxLot,
};
pub use plan::{build_plan, HarvestAction, HarvestPlan, LotRef, PlanTotals, NO_REPLACEMENT_REASON};
pub use policy::{ClusterMap, HarvestPolicy, PolicyStore, WashSaleCluster};
pub use snapshot::Snapshot;
pub use substitutes::{check_replacements, resolve_replacement, ReplacementCheck, SkipReason};
pub use wash_sale::{
    earliest_triggering_purchase, triggering_purchases, would_trigger_wash_sale, WashSaleWindow,
    WASH_SALE_LOOKBACK_DAYS, WASH_SALE_WINDOW_DAYS,
};
