//! Error types for portfolio construction and rebalancing.

use rust_decimal::Decimal;

use crate::types::{AccountId, Ticker};

/// All errors the rebalancing core can return.
///
/// Reference and policy errors are hard failures. Infeasibility is never an
/// error: the search loop absorbs it and reports a degraded outcome instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A ticker named by a holding, allocation, or account set is not in the catalog.
    #[error("unknown ticker: {0}")]
    UnknownTicker(Ticker),

    /// Allocation policy rejected at set time.
    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),

    /// No account can hold the ticker directly or through an equivalent.
    #[error("no account can hold {0} directly or via an equivalent ticker")]
    UnsatisfiableAllocation(Ticker),

    #[error("{ticker} is not permissible in account {account}")]
    NotPermissible { account: String, ticker: Ticker },

    #[error("quantity for {ticker} would become negative ({quantity})")]
    NegativeQuantity { ticker: Ticker, quantity: Decimal },

    #[error("invalid asset {ticker}: {reason}")]
    InvalidAsset { ticker: Ticker, reason: String },

    #[error("portfolio already contains an account named {0}")]
    DuplicateAccount(String),

    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// The legacy `{ticker}_{account}` key cannot be split back unambiguously.
    #[error("ambiguous result key: ticker {ticker:?} / account {account:?} contains '_'")]
    AmbiguousKey { ticker: Ticker, account: String },

    #[error("config error: {0}")]
    Config(String),

    /// A decimal value could not be represented for the solver (or back).
    #[error("numeric conversion failed: {0}")]
    Numeric(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::UnknownTicker(Ticker::new("XYZ")).to_string(),
            "unknown ticker: XYZ"
        );
        assert_eq!(
            Error::NotPermissible {
                account: "Roth".into(),
                ticker: Ticker::new("GBTC"),
            }
            .to_string(),
            "GBTC is not permissible in account Roth"
        );
    }

    #[test]
    fn is_error() {
        let err: Box<dyn std::error::Error> = Box::new(Error::Config("bad step".into()));
        assert!(err.to_string().contains("bad step"));
    }
}
