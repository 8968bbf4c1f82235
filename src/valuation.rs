//! Holding, account, and portfolio valuation.
//!
//! Two treatments exist. The full treatment counts every quantity as held.
//! The rebalance treatment truncates non-cash quantities in accounts that
//! cannot trade fractions, since those fractions never enter the optimizer.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::account::{Account, Holding};
use crate::asset::Asset;
use crate::catalog::AssetCatalog;
use crate::error::{Error, Result};
use crate::portfolio::Portfolio;

/// Decimal to solver float.
pub(crate) fn to_f64(value: Decimal) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| Error::Numeric(format!("{value} has no f64 representation")))
}

/// Solver float to decimal.
pub(crate) fn from_f64(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| Error::Numeric(format!("{value} is out of decimal range")))
}

/// Value of one holding. With `include_fractional` false the quantity of a
/// non-cash asset is truncated to whole units first.
pub fn holding_value(holding: &Holding, asset: &Asset, include_fractional: bool) -> Decimal {
    let quantity = if include_fractional || asset.is_cash() {
        holding.quantity()
    } else {
        holding.quantity().trunc()
    };
    quantity * asset.value()
}

/// Sum of holding values in an account.
pub fn account_value(
    account: &Account,
    catalog: &impl AssetCatalog,
    include_fractional: bool,
) -> Result<Decimal> {
    account.holdings().try_fold(Decimal::ZERO, |total, h| -> Result<Decimal> {
        let asset = catalog.require(h.ticker().as_str())?;
        Ok(total + holding_value(h, &asset, include_fractional))
    })
}

/// Value the optimizer must conserve for this account.
pub fn rebalance_value(account: &Account, catalog: &impl AssetCatalog) -> Result<Decimal> {
    account_value(account, catalog, account.allow_fractional())
}

/// Full portfolio value, fractions included.
pub fn portfolio_value(portfolio: &Portfolio, catalog: &impl AssetCatalog) -> Result<Decimal> {
    portfolio
        .accounts()
        .try_fold(Decimal::ZERO, |total, a| {
            account_value(a, catalog, true).map(|v| total + v)
        })
}

/// Portfolio value the target bands are computed from.
pub fn portfolio_rebalance_value(
    portfolio: &Portfolio,
    catalog: &impl AssetCatalog,
) -> Result<Decimal> {
    portfolio
        .accounts()
        .try_fold(Decimal::ZERO, |total, a| {
            rebalance_value(a, catalog).map(|v| total + v)
        })
}
