use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarvestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Plan invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// Non-fatal condition surfaced alongside a selection or plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The lot's security has no price in the market snapshot.
    MissingPrice { lot_id: String, security_id: String },
    /// The lot (or its price) failed validation and was not evaluated.
    InvalidInput { lot_id: String, message: String },
    /// A purchase event failed validation and was ignored by the wash-sale check.
    InvalidPurchase {
        security_id: String,
        date: NaiveDate,
        message: String,
    },
    /// The security has neither a cluster nor a replacement list.
    PolicyGap { security_id: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingPrice { lot_id, security_id } => {
                write!(f, "lot {} skipped: no price for {}", lot_id, security_id)
            }
            Diagnostic::InvalidInput { lot_id, message } => {
                write!(f, "lot {} skipped: {}", lot_id, message)
            }
            Diagnostic::InvalidPurchase {
                security_id,
                date,
                message,
            } => {
                write!(f, "purchase of {} on {} ignored: {}", security_id, date, message)
            }
            Diagnostic::PolicyGap { security_id } => {
                write!(f, "{} has no cluster or replacement policy", security_id)
            }
        }
    }
}
