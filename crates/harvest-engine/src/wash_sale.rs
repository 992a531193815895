//! Wash Sale Rule Evaluation
//!
//! Decides whether selling a security on a date would collide with a
//! purchase of a substantially identical security.

use crate::error::{HarvestError, Result};
use crate::models::{PurchaseEvent, PurchaseHistory};
use crate::policy::ClusterMap;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar days on each side of the sale date
pub const WASH_SALE_LOOKBACK_DAYS: i64 = 30;

/// Full window length, sale date included
pub const WASH_SALE_WINDOW_DAYS: i64 = 2 * WASH_SALE_LOOKBACK_DAYS + 1;

/// The 61-day window around a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashSaleWindow {
    pub sale_date: NaiveDate,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

impl WashSaleWindow {
    /// Window centred on a sale date
    pub fn around(sale_date: NaiveDate) -> Self {
        Self {
            sale_date,
            window_start: sale_date - Duration::days(WASH_SALE_LOOKBACK_DAYS),
            window_end: sale_date + Duration::days(WASH_SALE_LOOKBACK_DAYS),
        }
    }

    /// Check if a date is within this window (both ends inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.window_start && date <= self.window_end
    }

    /// First day a substantially identical security can be bought back
    pub fn safe_repurchase_date(&self) -> NaiveDate {
        self.window_end + Duration::days(1)
    }

}

fn require_sale_date(sale_date: Option<NaiveDate>) -> Result<NaiveDate> {
    sale_date.ok_or_else(|| HarvestError::InvalidInput("sale date is required".to_string()))
}

/// Valid purchases of anything in `security_id`'s cluster that fall inside
/// the window around `sale_date`, in history order. Events that fail
/// validation never count as purchases.
pub fn triggering_purchases<'a>(
    security_id: &'a str,
    sale_date: Option<NaiveDate>,
    history: &'a PurchaseHistory,
    clusters: &'a ClusterMap,
) -> Result<impl Iterator<Item = &'a PurchaseEvent> + 'a> {
    let window = WashSaleWindow::around(require_sale_date(sale_date)?);

    Ok(history.iter().filter(move |p| {
        clusters.same_cluster(security_id, &p.security_id)
            && window.contains(p.date)
            && p.validate().is_ok()
    }))
}

/// Whether selling `security_id` on `sale_date` would be a wash sale
pub fn would_trigger_wash_sale(
    security_id: &str,
    sale_date: Option<NaiveDate>,
    history: &PurchaseHistory,
    clusters: &ClusterMap,
) -> Result<bool> {
    Ok(triggering_purchases(security_id, sale_date, history, clusters)?
        .next()
        .is_some())
}

/// Earliest purchase that makes the sale a wash sale, for explanations
pub fn earliest_triggering_purchase<'a>(
    security_id: &'a str,
    sale_date: Option<NaiveDate>,
    history: &'a PurchaseHistory,
    clusters: &'a ClusterMap,
) -> Result<Option<&'a PurchaseEvent>> {
    Ok(triggering_purchases(security_id, sale_date, history, clusters)?
        .min_by(|a, b| a.date.cmp(&b.date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::WashSaleCluster;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sp500() -> ClusterMap {
        ClusterMap::new(vec![WashSaleCluster::new(["SPY", "IVV", "VOO"])]).unwrap()
    }

    #[test]
    fn test_wash_sale_window() {
        let window = WashSaleWindow::around(date(2024, 6, 15));

        // Window should span 30 days before and after
        assert_eq!(window.window_start, date(2024, 5, 16));
        assert_eq!(window.window_end, date(2024, 7, 15));
        assert_eq!(window.safe_repurchase_date(), date(2024, 7, 16));
        assert!(window.contains(date(2024, 7, 15)));
        assert!(!window.contains(date(2024, 7, 16)));
        assert_eq!(
            (window.window_end - window.window_start).num_days() + 1,
            WASH_SALE_WINDOW_DAYS
        );
    }

    #[test]
    fn test_window_edges_are_inclusive() {
        let sale = date(2024, 6, 15);
        let clusters = ClusterMap::default();

        for (offset, expected) in [(-31, false), (-30, true), (0, true), (30, true), (31, false)] {
            let history = PurchaseHistory::new(vec![PurchaseEvent::new(
                "AAPL",
                sale + Duration::days(offset),
                1.0,
            )
            .unwrap()]);
            assert_eq!(
                would_trigger_wash_sale("AAPL", Some(sale), &history, &clusters).unwrap(),
                expected,
                "offset {}",
                offset
            );
        }
    }

    #[test]
    fn test_cluster_member_purchase_triggers() {
        let sale = date(2024, 6, 15);
        let history =
            PurchaseHistory::new(vec![PurchaseEvent::new("VOO", date(2024, 6, 1), 5.0).unwrap()]);

        assert!(would_trigger_wash_sale("SPY", Some(sale), &history, &sp500()).unwrap());
        // Different security should be safe
        assert!(!would_trigger_wash_sale("QQQ", Some(sale), &history, &sp500()).unwrap());
    }

    #[test]
    fn test_empty_history_is_safe() {
        let history = PurchaseHistory::default();
        let sale = Some(date(2024, 6, 15));
        assert!(!would_trigger_wash_sale("SPY", sale, &history, &sp500()).unwrap());
    }

    #[test]
    fn test_missing_sale_date_is_invalid() {
        let history = PurchaseHistory::default();
        let result = would_trigger_wash_sale("SPY", None, &history, &sp500());
        assert!(matches!(result, Err(HarvestError::InvalidInput(_))));
    }

    #[test]
    fn test_earliest_triggering_purchase() {
        let sale = date(2024, 6, 15);
        let history = PurchaseHistory::new(vec![
            PurchaseEvent::new("SPY", date(2024, 6, 10), 1.0).unwrap(),
            PurchaseEvent::new("IVV", date(2024, 5, 20), 1.0).unwrap(),
            PurchaseEvent::new("VOO", date(2024, 1, 2), 1.0).unwrap(),
        ]);

        let groups = sp500();
        let earliest = earliest_triggering_purchase("SPY", Some(sale), &history, &groups)
            .unwrap()
            .unwrap();
        assert_eq!(earliest.security_id, "IVV");
        assert_eq!(earliest.date, date(2024, 5, 20));
    }

    #[test]
    fn test_invalid_purchases_never_trigger() {
        let sale = date(2024, 11, 20);
        // Deserialized events skip `PurchaseEvent::new`
        let bad = |quantity: f64| PurchaseEvent {
            security_id: "VOO".to_string(),
            date: date(2024, 11, 15),
            quantity,
        };
        let history = PurchaseHistory::new(vec![bad(-5.0), bad(0.0), bad(f64::NAN)]);

        assert!(!would_trigger_wash_sale("SPY", Some(sale), &history, &sp500()).unwrap());
        assert!(earliest_triggering_purchase("SPY", Some(sale), &history, &sp500())
            .unwrap()
            .is_none());
    }
}
