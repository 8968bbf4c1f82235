//! Asset value object and asset classes.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::Ticker;

/// Broad class of an asset. Cash gets special treatment throughout the
/// optimizer: it is always continuous and carries its own objective weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AssetClass {
    Stock,
    Crypto,
    Cash,
    Property,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Stock => write!(f, "stock"),
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Cash => write!(f, "cash"),
            AssetClass::Property => write!(f, "property"),
        }
    }
}

/// A priced asset as seen by the optimizer.
///
/// Immutable: the `with_*` methods return a modified copy and leave the
/// original untouched.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asset {
    ticker: Ticker,
    value: Decimal,
    class: AssetClass,
    fractional: bool,
    equivalent: Option<Ticker>,
    updated: DateTime<Utc>,
}

impl Asset {
    /// Create an asset with the given unit value.
    ///
    /// Exchange-listed stocks default to whole shares; every other class
    /// defaults to fractional. The update time starts at the Unix epoch.
    pub fn new(ticker: impl Into<Ticker>, value: Decimal, class: AssetClass) -> Result<Self> {
        let ticker = ticker.into();
        check_value(&ticker, value)?;
        Ok(Self {
            ticker,
            value,
            class,
            fractional: class != AssetClass::Stock,
            equivalent: None,
            updated: DateTime::default(),
        })
    }

    /// Unit-valued seed entry. Seeds are static and known-valid.
    pub(crate) fn seed(
        ticker: &str,
        class: AssetClass,
        fractional: bool,
        equivalent: Option<&str>,
    ) -> Self {
        Self {
            ticker: Ticker::new(ticker),
            value: Decimal::ONE,
            class,
            fractional,
            equivalent: equivalent.map(Ticker::new),
            updated: DateTime::default(),
        }
    }

    #[inline]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Unit value in the portfolio's currency.
    #[inline]
    pub fn value(&self) -> Decimal {
        self.value
    }

    #[inline]
    pub fn class(&self) -> AssetClass {
        self.class
    }

    #[inline]
    pub fn is_cash(&self) -> bool {
        self.class == AssetClass::Cash
    }

    /// Whether the asset itself trades in fractional units.
    ///
    /// Informational: the optimizer uses the account-level flag, which
    /// overrides this one.
    #[inline]
    pub fn fractional(&self) -> bool {
        self.fractional
    }

    /// Ticker treated as interchangeable with this one for allocation purposes.
    #[inline]
    pub fn equivalent(&self) -> Option<&Ticker> {
        self.equivalent.as_ref()
    }

    #[inline]
    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    /// Copy with a new unit value.
    pub fn with_value(&self, value: Decimal) -> Result<Self> {
        check_value(&self.ticker, value)?;
        Ok(Self {
            value,
            ..self.clone()
        })
    }

    /// Copy with a new last-updated time.
    pub fn with_updated(&self, updated: DateTime<Utc>) -> Self {
        Self {
            updated,
            ..self.clone()
        }
    }

    pub fn with_fractional(&self, fractional: bool) -> Self {
        Self {
            fractional,
            ..self.clone()
        }
    }

    /// Copy with a new equivalent ticker. An asset cannot be its own equivalent.
    pub fn with_equivalent(&self, equivalent: Option<Ticker>) -> Result<Self> {
        if equivalent.as_ref() == Some(&self.ticker) {
            return Err(Error::InvalidAsset {
                ticker: self.ticker.clone(),
                reason: "equivalent ticker must differ from the asset's own ticker".into(),
            });
        }
        Ok(Self {
            equivalent,
            ..self.clone()
        })
    }
}

fn check_value(ticker: &Ticker, value: Decimal) -> Result<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::InvalidAsset {
            ticker: ticker.clone(),
            reason: format!("value must be >= 0, got {value}"),
        });
    }
    Ok(())
}
