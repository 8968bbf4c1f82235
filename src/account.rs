//! Accounts and their holdings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{AccountId, Ticker};

/// Account type. Determines the default priority and undesired sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AccountType {
    Taxable,
    Roth,
    CryptoWallet,
    Property,
}

impl AccountType {
    /// Tickers this account type prefers to hold.
    pub fn default_priority(self) -> &'static [&'static str] {
        match self {
            AccountType::Taxable => &["VEA", "VWO"],
            AccountType::Roth => &["VNQ", "BND", "GBTC", "ETHE"],
            AccountType::CryptoWallet => &["bitcoin", "ethereum"],
            AccountType::Property => &["PROPERTY"],
        }
    }

    /// Tickers this account type prefers to avoid.
    pub fn default_undesired(self) -> &'static [&'static str] {
        match self {
            AccountType::Taxable => &["GBTC", "ETHE"],
            AccountType::Roth | AccountType::CryptoWallet | AccountType::Property => &["CASH"],
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Taxable => write!(f, "taxable"),
            AccountType::Roth => write!(f, "roth"),
            AccountType::CryptoWallet => write!(f, "crypto_wallet"),
            AccountType::Property => write!(f, "property"),
        }
    }
}

/// Quantity of one asset held in one account.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holding {
    ticker: Ticker,
    quantity: Decimal,
}

impl Holding {
    #[inline]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    #[inline]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Part of the quantity below one whole unit.
    #[inline]
    pub fn fractional_part(&self) -> Decimal {
        self.quantity - self.quantity.trunc()
    }
}

/// A single investment account.
///
/// Every holding's ticker is permissible in the account; the mutators
/// enforce this and keep quantities non-negative.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    id: AccountId,
    name: String,
    kind: AccountType,
    allow_fractional: bool,
    permissible: BTreeSet<Ticker>,
    priority: BTreeSet<Ticker>,
    undesired: BTreeSet<Ticker>,
    holdings: BTreeMap<Ticker, Holding>,
}

impl Account {
    /// Create an empty account with the type's default priority and
    /// undesired sets. The id is assigned when the account joins a portfolio.
    pub fn new(name: impl Into<String>, kind: AccountType, allow_fractional: bool) -> Self {
        Self {
            id: AccountId::default(),
            name: name.into(),
            kind,
            allow_fractional,
            permissible: BTreeSet::new(),
            priority: kind.default_priority().iter().map(|t| Ticker::new(*t)).collect(),
            undesired: kind.default_undesired().iter().map(|t| Ticker::new(*t)).collect(),
            holdings: BTreeMap::new(),
        }
    }

    /// Builder form of [`set_permissible`](Self::set_permissible).
    pub fn with_permissible<I, T>(mut self, tickers: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Ticker>,
    {
        self.set_permissible(tickers)?;
        Ok(self)
    }

    // === Accessors ===

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: AccountId) {
        self.id = id;
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> AccountType {
        self.kind
    }

    /// Account-level fractional override.
    #[inline]
    pub fn allow_fractional(&self) -> bool {
        self.allow_fractional
    }

    pub fn permissible(&self) -> &BTreeSet<Ticker> {
        &self.permissible
    }

    pub fn priority(&self) -> &BTreeSet<Ticker> {
        &self.priority
    }

    pub fn undesired(&self) -> &BTreeSet<Ticker> {
        &self.undesired
    }

    pub fn is_permissible(&self, ticker: &str) -> bool {
        self.permissible.contains(ticker)
    }

    pub fn is_undesired(&self, ticker: &str) -> bool {
        self.undesired.contains(ticker)
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    /// Holdings in ticker order.
    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    /// Held quantity, zero when the ticker is not held.
    pub fn quantity(&self, ticker: &str) -> Decimal {
        self.holdings
            .get(ticker)
            .map_or(Decimal::ZERO, Holding::quantity)
    }

    /// `target` minus the currently held quantity.
    pub fn quantity_difference(&self, ticker: &str, target: Decimal) -> Decimal {
        target - self.quantity(ticker)
    }

    // === Mutators ===

    /// Replace the permissible set. Fails if a held ticker would drop out.
    pub fn set_permissible<I, T>(&mut self, tickers: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Ticker>,
    {
        let next: BTreeSet<Ticker> = tickers.into_iter().map(Into::into).collect();
        if let Some(held) = self.holdings.keys().find(|t| !next.contains(*t)) {
            return Err(Error::NotPermissible {
                account: self.name.clone(),
                ticker: held.clone(),
            });
        }
        self.permissible = next;
        Ok(())
    }

    /// Add a single ticker to the permissible set.
    pub fn permit(&mut self, ticker: impl Into<Ticker>) {
        self.permissible.insert(ticker.into());
    }

    pub fn set_priority<I, T>(&mut self, tickers: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Ticker>,
    {
        self.priority = tickers.into_iter().map(Into::into).collect();
    }

    pub fn set_undesired<I, T>(&mut self, tickers: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Ticker>,
    {
        self.undesired = tickers.into_iter().map(Into::into).collect();
    }

    /// Add `quantity` to the holding for `ticker`, creating it if needed.
    ///
    /// A negative `quantity` reduces the holding; the result may not go
    /// below zero.
    pub fn add_holding(&mut self, ticker: impl Into<Ticker>, quantity: Decimal) -> Result<()> {
        let ticker = ticker.into();
        if !self.permissible.contains(&ticker) {
            return Err(Error::NotPermissible {
                account: self.name.clone(),
                ticker,
            });
        }
        let next = self.quantity(ticker.as_str()) + quantity;
        if next.is_sign_negative() && !next.is_zero() {
            return Err(Error::NegativeQuantity {
                ticker,
                quantity: next,
            });
        }
        self.holdings.insert(
            ticker.clone(),
            Holding {
                ticker,
                quantity: next,
            },
        );
        Ok(())
    }
}
