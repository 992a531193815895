//! Plan Explanations
//!
//! Turns a finished plan into prose for the investor. Explainers only read
//! the plan; nothing they produce feeds back into it.

use crate::plan::{HarvestAction, HarvestPlan};
use std::fmt::Write;

/// Produces a human-readable explanation of a harvest plan
pub trait PlanExplainer {
    fn explain(&self, plan: &HarvestPlan) -> String;
}

/// Deterministic bullet-point summary
#[derive(Debug, Clone, Default)]
pub struct TextExplainer {
    /// Omit the closing disclaimer line
    pub omit_disclaimer: bool,
}

impl TextExplainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn describe(action: &HarvestAction) -> String {
        let lot = &action.lot;

        if action.blocked {
            return format!(
                "BLOCKED {}[lot {}]: {}",
                lot.security_id,
                lot.lot_id,
                action.reason.as_deref().unwrap_or("wash sale")
            );
        }

        let mut line = format!(
            "SELL {}[lot {}] to harvest ${:.2} ({:.1}%)",
            lot.security_id,
            lot.lot_id,
            action.estimated_loss,
            action.loss_percentage * 100.0
        );

        match (&action.replacement, action.replacement_quantity) {
            (Some(replacement), Some(qty)) => {
                let _ = write!(line, "; BUY {} (~{:.4} units)", replacement.id, qty);
            }
            (Some(replacement), None) => {
                let _ = write!(line, "; BUY {} (no price to size the order)", replacement.id);
            }
            (None, _) => {
                let reason = action.reason.as_deref().unwrap_or("no replacement");
                let _ = write!(line, "; {}, proceeds stay in cash", reason);
            }
        }

        let _ = write!(line, ". Re-enter {} on or after {}.", lot.security_id, action.reentry_date);
        line
    }
}

impl PlanExplainer for TextExplainer {
    fn explain(&self, plan: &HarvestPlan) -> String {
        let mut lines = vec![format!(
            "As of {}, estimated harvestable loss is ${:.2} across {} sale(s).",
            plan.evaluation_date, plan.totals.total_actionable_loss, plan.totals.count_actionable
        )];

        if plan.totals.count_blocked > 0 {
            lines.push(format!(
                "{} sale(s) worth ${:.2} are blocked by the wash-sale rule.",
                plan.totals.count_blocked, plan.totals.blocked_loss
            ));
        }

        if plan.totals.simulated_cash_delta.abs() > 0.01 {
            lines.push(format!(
                "Approx. cash drift from replacements: ${:.2}.",
                plan.totals.simulated_cash_delta
            ));
        }

        lines.extend(plan.actions.iter().map(Self::describe));
        lines.extend(plan.diagnostics.iter().map(|d| format!("NOTE {}", d)));

        if plan.actions.is_empty() {
            lines.push("No lots meet the harvesting thresholds.".to_string());
        }

        if !self.omit_disclaimer {
            lines.push("(Estimates only, not tax advice.)".to_string());
        }

        lines.join("\n")
    }
}
