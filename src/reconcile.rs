//! Turn solver values into target quantities.
//!
//! Integer variables only see whole units, so fractional remainders of
//! holdings in whole-share accounts would silently vanish. The reconciler
//! puts them back.

use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::LinearProgram;
use crate::portfolio::Portfolio;
use crate::result::{PositionKey, RebalanceResult};
use crate::valuation::from_f64;

/// Decimal places kept for continuous quantities.
pub const QUANTITY_DP: u32 = 8;

/// Build the result map from one solve.
///
/// `values` holds one entry per program variable; an empty slice (no
/// solution) yields an empty result.
pub fn reconcile(
    program: &LinearProgram,
    values: &[f64],
    portfolio: &Portfolio,
) -> Result<RebalanceResult> {
    let mut result = RebalanceResult::new();
    if values.is_empty() {
        return Ok(result);
    }

    for (var, &x) in program.variables.iter().zip(values) {
        let x = if var.is_integer() { x.round() } else { x };
        let quantity = if x > 0.0 {
            from_f64(x)?.round_dp(QUANTITY_DP).normalize()
        } else {
            Decimal::ZERO
        };
        result.insert(var.key.clone(), quantity);
    }

    for account in portfolio.accounts().filter(|a| !a.allow_fractional()) {
        for holding in account.holdings() {
            let remainder = holding.fractional_part();
            if remainder.is_zero() {
                continue;
            }
            let Some(var) = program.var(holding.ticker().as_str(), account.name()) else {
                continue;
            };
            if program.variables[var].is_integer() {
                result.adjust(
                    &PositionKey::new(holding.ticker(), account.name()),
                    remainder,
                );
            }
        }
    }
    Ok(result)
}
