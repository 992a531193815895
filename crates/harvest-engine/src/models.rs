//! Portfolio and market inputs
//!
//! Value types the engine reads: securities, tax lots, prices and the
//! purchase events used for wash-sale lookback.

use crate::error::{HarvestError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Broad asset class of a security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Etf,
    MutualFund,
    Bond,
    #[default]
    Other,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Equity => write!(f, "Equity"),
            AssetClass::Etf => write!(f, "ETF"),
            AssetClass::MutualFund => write!(f, "Mutual Fund"),
            AssetClass::Bond => write!(f, "Bond"),
            AssetClass::Other => write!(f, "Other"),
        }
    }
}

/// Reference data for a tradable security
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Ticker symbol
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub asset_class: AssetClass,
}

impl Security {
    pub fn new(id: impl Into<String>, name: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset_class,
        }
    }

    /// A security known only by its ticker
    pub fn unlisted(id: &str) -> Self {
        Self::new(id, id, AssetClass::Other)
    }
}

/// A tax lot: one batch of units with its own basis and acquisition date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLot {
    /// Unique lot ID
    pub id: String,
    /// Security held
    #[serde(alias = "symbol")]
    pub security_id: String,
    /// Units held; positive while the lot is open
    pub quantity: f64,
    /// Cost basis per unit
    pub cost_basis_per_unit: f64,
    /// Acquisition date
    pub acquired_on: NaiveDate,
}

impl TaxLot {
    /// Create a validated tax lot
    pub fn new(
        id: impl Into<String>,
        security_id: impl Into<String>,
        quantity: f64,
        cost_basis_per_unit: f64,
        acquired_on: NaiveDate,
    ) -> Result<Self> {
        let lot = Self {
            id: id.into(),
            security_id: security_id.into(),
            quantity,
            cost_basis_per_unit,
            acquired_on,
        };
        lot.validate()?;
        Ok(lot)
    }

    /// Check the lot's invariants. Deserialized lots bypass `new`, so the
    /// selector calls this before evaluating them.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(HarvestError::InvalidInput("lot id is empty".to_string()));
        }
        if self.security_id.trim().is_empty() {
            return Err(HarvestError::InvalidInput(format!(
                "lot {} has no security id",
                self.id
            )));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(HarvestError::InvalidInput(format!(
                "lot {} quantity must be positive, got {}",
                self.id, self.quantity
            )));
        }
        if !self.cost_basis_per_unit.is_finite() || self.cost_basis_per_unit <= 0.0 {
            return Err(HarvestError::InvalidInput(format!(
                "lot {} cost basis must be positive, got {}",
                self.id, self.cost_basis_per_unit
            )));
        }
        Ok(())
    }

    /// Total cost basis of the lot
    pub fn total_cost_basis(&self) -> f64 {
        self.quantity * self.cost_basis_per_unit
    }

    /// Unrealized gain (positive) or loss (negative) at a price
    pub fn unrealized_gain_loss(&self, current_price: f64) -> f64 {
        (current_price - self.cost_basis_per_unit) * self.quantity
    }

    /// Shrink the lot after a partial sale. Selling the whole lot closes it,
    /// which callers model by dropping the lot.
    pub fn reduce(&mut self, sold: f64) -> Result<()> {
        if !sold.is_finite() || sold <= 0.0 {
            return Err(HarvestError::InvalidInput(format!(
                "sold quantity must be positive, got {}",
                sold
            )));
        }
        if sold >= self.quantity {
            return Err(HarvestError::InvalidInput(format!(
                "selling {} of lot {} would close it (holds {})",
                sold, self.id, self.quantity
            )));
        }
        self.quantity -= sold;
        Ok(())
    }
}

/// Point-in-time price of a security
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub price: f64,
    pub as_of: DateTime<Utc>,
}

impl MarketPrice {
    pub fn new(price: f64, as_of: DateTime<Utc>) -> Result<Self> {
        let quote = Self { price, as_of };
        quote.validate()?;
        Ok(quote)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(HarvestError::InvalidInput(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Current prices keyed by security id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketSnapshot {
    prices: BTreeMap<String, MarketPrice>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot where every quote shares one timestamp
    pub fn from_prices<I, S>(prices: I, as_of: DateTime<Utc>) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        for (id, price) in prices {
            snapshot.insert(id, MarketPrice::new(price, as_of)?);
        }
        Ok(snapshot)
    }

    pub fn insert(&mut self, security_id: impl Into<String>, quote: MarketPrice) {
        self.prices.insert(security_id.into(), quote);
    }

    pub fn get(&self, security_id: &str) -> Option<&MarketPrice> {
        self.prices.get(security_id)
    }

    pub fn price(&self, security_id: &str) -> Option<f64> {
        self.prices.get(security_id).map(|q| q.price)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A dated purchase, used only for wash-sale lookback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEvent {
    #[serde(alias = "symbol")]
    pub security_id: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

impl PurchaseEvent {
    pub fn new(security_id: impl Into<String>, date: NaiveDate, quantity: f64) -> Result<Self> {
        let event = Self {
            security_id: security_id.into(),
            date,
            quantity,
        };
        event.validate()?;
        Ok(event)
    }

    /// Deserialized events bypass `new`; the wash-sale check ignores any
    /// event that fails here.
    pub fn validate(&self) -> Result<()> {
        if self.security_id.trim().is_empty() {
            return Err(HarvestError::InvalidInput(format!(
                "purchase on {} has no security id",
                self.date
            )));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(HarvestError::InvalidInput(format!(
                "purchase quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// Recent purchases across all securities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseHistory {
    events: Vec<PurchaseEvent>,
}

impl PurchaseHistory {
    pub fn new(events: Vec<PurchaseEvent>) -> Self {
        Self { events }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PurchaseEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<PurchaseEvent>> for PurchaseHistory {
    fn from(events: Vec<PurchaseEvent>) -> Self {
        Self::new(events)
    }
}
