//! Rebalance output: target quantity per (ticker, account).

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::Ticker;

/// Separator of the legacy `{ticker}_{account}` key.
pub const WIRE_SEPARATOR: char = '_';

/// One position: an asset in a named account.
///
/// Orders by ticker first, then account name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionKey {
    pub ticker: Ticker,
    pub account: String,
}

impl PositionKey {
    pub fn new(ticker: impl Into<Ticker>, account: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            account: account.into(),
        }
    }

    /// Legacy `{ticker}_{account}` key.
    ///
    /// Fails when either part contains the separator, since the key could
    /// not be split back.
    pub fn to_wire(&self) -> Result<String> {
        if self.ticker.as_str().contains(WIRE_SEPARATOR) || self.account.contains(WIRE_SEPARATOR) {
            return Err(Error::AmbiguousKey {
                ticker: self.ticker.clone(),
                account: self.account.clone(),
            });
        }
        Ok(format!("{}{WIRE_SEPARATOR}{}", self.ticker, self.account))
    }

    /// Parse a legacy key. `None` unless it splits into exactly two
    /// non-empty parts.
    pub fn from_wire(key: &str) -> Option<Self> {
        let mut parts = key.split(WIRE_SEPARATOR);
        let (ticker, account) = (parts.next()?, parts.next()?);
        if parts.next().is_some() || ticker.is_empty() || account.is_empty() {
            return None;
        }
        Some(Self::new(ticker, account))
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.ticker, self.account)
    }
}

/// Target quantity for every position the optimizer decided on.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceResult {
    #[cfg_attr(feature = "serde", serde(with = "serde_positions"))]
    positions: BTreeMap<PositionKey, Decimal>,
}

/// Serde helper for `BTreeMap<PositionKey, Decimal>`: a list of
/// `(key, quantity)` pairs, since structured keys are not valid JSON keys.
#[cfg(feature = "serde")]
mod serde_positions {
    use super::{BTreeMap, Decimal, PositionKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<PositionKey, Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let vec: Vec<(&PositionKey, &Decimal)> = map.iter().collect();
        vec.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PositionKey, Decimal>, D::Error> {
        let vec: Vec<(PositionKey, Decimal)> = Vec::deserialize(deserializer)?;
        Ok(vec.into_iter().collect())
    }
}

impl RebalanceResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PositionKey, quantity: Decimal) -> Option<Decimal> {
        self.positions.insert(key, quantity)
    }

    /// Add `delta` to an existing entry. Returns `false` if the key is absent.
    pub fn adjust(&mut self, key: &PositionKey, delta: Decimal) -> bool {
        match self.positions.get_mut(key) {
            Some(q) => {
                *q += delta;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, ticker: &str, account: &str) -> Option<Decimal> {
        self.positions
            .get(&PositionKey::new(ticker, account))
            .copied()
    }

    /// Positions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PositionKey, Decimal)> {
        self.positions.iter().map(|(k, q)| (k, *q))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions under legacy string keys.
    pub fn to_wire(&self) -> Result<BTreeMap<String, Decimal>> {
        self.positions
            .iter()
            .map(|(k, q)| Ok((k.to_wire()?, *q)))
            .collect()
    }

    /// Rebuild from legacy string keys. Unparseable keys are returned
    /// alongside the result.
    pub fn from_wire<I, K>(entries: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        let mut result = Self::new();
        let mut rejected = Vec::new();
        for (key, quantity) in entries {
            match PositionKey::from_wire(key.as_ref()) {
                Some(k) => {
                    result.insert(k, quantity);
                }
                None => rejected.push(key.as_ref().to_string()),
            }
        }
        (result, rejected)
    }
}

impl FromIterator<(PositionKey, Decimal)> for RebalanceResult {
    fn from_iter<I: IntoIterator<Item = (PositionKey, Decimal)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}
