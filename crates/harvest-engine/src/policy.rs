//! Harvest Policy Store
//!
//! Substantially-identical clusters, per-security replacement lists and the
//! loss thresholds that decide what is worth harvesting.

use crate::error::{HarvestError, Result};
use crate::models::{AssetClass, Security};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Securities treated as substantially identical to one another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WashSaleCluster {
    pub members: BTreeSet<String>,
}

impl WashSaleCluster {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, security_id: &str) -> bool {
        self.members.contains(security_id)
    }
}

/// Lookup from security to its cluster. A security belongs to at most one
/// cluster; anything unlisted is a singleton cluster of itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WashSaleCluster>", into = "Vec<WashSaleCluster>")]
pub struct ClusterMap {
    clusters: Vec<WashSaleCluster>,
    index: BTreeMap<String, usize>,
}

impl ClusterMap {
    pub fn new(clusters: Vec<WashSaleCluster>) -> Result<Self> {
        let mut index = BTreeMap::new();
        for (i, cluster) in clusters.iter().enumerate() {
            for member in &cluster.members {
                if let Some(prev) = index.insert(member.clone(), i) {
                    return Err(HarvestError::Policy(format!(
                        "{} appears in clusters {} and {}",
                        member, prev, i
                    )));
                }
            }
        }
        Ok(Self { clusters, index })
    }

    pub fn is_clustered(&self, security_id: &str) -> bool {
        self.index.contains_key(security_id)
    }

    /// Every id substantially identical to `security_id`, itself included
    pub fn members_of(&self, security_id: &str) -> BTreeSet<String> {
        match self.index.get(security_id) {
            Some(&i) => self.clusters[i].members.clone(),
            None => BTreeSet::from([security_id.to_string()]),
        }
    }

    pub fn same_cluster(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (self.index.get(a), self.index.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

impl TryFrom<Vec<WashSaleCluster>> for ClusterMap {
    type Error = HarvestError;

    fn try_from(clusters: Vec<WashSaleCluster>) -> Result<Self> {
        Self::new(clusters)
    }
}

impl From<ClusterMap> for Vec<WashSaleCluster> {
    fn from(map: ClusterMap) -> Self {
        map.clusters
    }
}

/// Harvesting thresholds and replacement preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestPolicy {
    /// Minimum loss in dollars
    pub min_loss_amount: f64,
    /// Minimum loss as a fraction of cost basis (0-1)
    pub min_loss_percentage: f64,
    /// Ordered replacement candidates per security
    #[serde(default)]
    pub replacements: BTreeMap<String, Vec<String>>,
    /// Borrow a cluster sibling's list when a security has none of its own
    #[serde(default)]
    pub inherit_cluster_replacements: bool,
}

impl Default for HarvestPolicy {
    fn default() -> Self {
        Self {
            min_loss_amount: 200.0,
            min_loss_percentage: 0.05,
            replacements: BTreeMap::new(),
            inherit_cluster_replacements: false,
        }
    }
}

impl HarvestPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.min_loss_amount.is_finite() || self.min_loss_amount < 0.0 {
            return Err(HarvestError::Policy(format!(
                "min_loss_amount must be non-negative, got {}",
                self.min_loss_amount
            )));
        }
        if !(0.0..=1.0).contains(&self.min_loss_percentage) {
            return Err(HarvestError::Policy(format!(
                "min_loss_percentage must be within 0-1, got {}",
                self.min_loss_percentage
            )));
        }
        Ok(())
    }
}

/// Everything the engine needs to know about policy, bundled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyStore {
    #[serde(default)]
    pub securities: Vec<Security>,
    #[serde(default)]
    pub clusters: ClusterMap,
    #[serde(default)]
    pub policy: HarvestPolicy,
}

impl PolicyStore {
    pub fn new(
        securities: Vec<Security>,
        clusters: ClusterMap,
        policy: HarvestPolicy,
    ) -> Result<Self> {
        let store = Self {
            securities,
            clusters,
            policy,
        };
        store.validate()?;
        Ok(store)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()
    }

    /// Reference data for a security, or an unlisted placeholder
    pub fn security(&self, security_id: &str) -> Security {
        self.securities
            .iter()
            .find(|s| s.id == security_id)
            .cloned()
            .unwrap_or_else(|| Security::unlisted(security_id))
    }

    /// Ordered replacement candidates for a security. Sibling lists are
    /// looked up in `clusters`, the same map the wash-sale check uses.
    pub fn replacements_for(&self, security_id: &str, clusters: &ClusterMap) -> &[String] {
        if let Some(list) = self.policy.replacements.get(security_id) {
            if !list.is_empty() {
                return list;
            }
        }

        if self.policy.inherit_cluster_replacements {
            for sibling in clusters.members_of(security_id) {
                if let Some(list) = self.policy.replacements.get(&sibling) {
                    if !list.is_empty() {
                        return list;
                    }
                }
            }
        }

        &[]
    }

    /// Whether `clusters` or the replacement lists say anything at all about
    /// this security
    pub fn has_coverage(&self, security_id: &str, clusters: &ClusterMap) -> bool {
        clusters.is_clustered(security_id) || self.policy.replacements.contains_key(security_id)
    }

    /// Broad-market ETF clusters with replacement lists for each
    pub fn demo() -> Self {
        let etf = |id: &str, name: &str| Security::new(id, name, AssetClass::Etf);
        let stock = |id: &str, name: &str| Security::new(id, name, AssetClass::Equity);

        let securities = vec![
            etf("SPY", "SPDR S&P 500 ETF Trust"),
            etf("IVV", "iShares Core S&P 500 ETF"),
            etf("VOO", "Vanguard S&P 500 ETF"),
            etf("QQQ", "Invesco QQQ Trust"),
            etf("QQQM", "Invesco NASDAQ 100 ETF"),
            etf("VTI", "Vanguard Total Stock Market ETF"),
            etf("ITOT", "iShares Core S&P Total U.S. Stock Market ETF"),
            etf("SCHB", "Schwab U.S. Broad Market ETF"),
            etf("SCHX", "Schwab U.S. Large-Cap ETF"),
            etf("VTV", "Vanguard Value ETF"),
            etf("SCHF", "Schwab International Equity ETF"),
            etf("SCHG", "Schwab U.S. Large-Cap Growth ETF"),
            etf("XLK", "Technology Select Sector SPDR Fund"),
            etf("IYW", "iShares U.S. Technology ETF"),
            etf("VGT", "Vanguard Information Technology ETF"),
            etf("XLY", "Consumer Discretionary Select Sector SPDR Fund"),
            etf("CARZ", "First Trust S-Network Future Vehicles & Technology ETF"),
            etf("DRIV", "Global X Autonomous & Electric Vehicles ETF"),
            etf("SOXX", "iShares Semiconductor ETF"),
            etf("SMH", "VanEck Semiconductor ETF"),
            stock("AAPL", "Apple Inc."),
            stock("TSLA", "Tesla, Inc."),
            stock("NVDA", "NVIDIA Corporation"),
        ];

        let clusters = vec![
            WashSaleCluster::new(["SPY", "IVV", "VOO"]),
            WashSaleCluster::new(["QQQ", "QQQM"]),
            WashSaleCluster::new(["VTI", "ITOT", "SCHB"]),
        ];

        let mut replacements = BTreeMap::new();
        let mut alternatives = |ids: &[&str], alts: &[&str]| {
            for id in ids {
                replacements.insert(id.to_string(), alts.iter().map(|a| a.to_string()).collect());
            }
        };
        alternatives(&["SPY", "IVV", "VOO"], &["VTI", "SCHX", "ITOT"]);
        alternatives(&["QQQ", "QQQM"], &["SCHG", "XLK", "IYW"]);
        alternatives(&["VTI", "ITOT", "SCHB"], &["SCHX", "VTV", "SCHF"]);
        alternatives(&["AAPL"], &["XLK", "VGT"]);
        alternatives(&["TSLA"], &["XLY", "CARZ", "DRIV"]);
        alternatives(&["NVDA"], &["SOXX", "SMH"]);

        Self {
            securities,
            // Demo clusters are disjoint by construction
            clusters: ClusterMap::new(clusters).unwrap_or_default(),
            policy: HarvestPolicy {
                replacements,
                ..HarvestPolicy::default()
            },
        }
    }
}
