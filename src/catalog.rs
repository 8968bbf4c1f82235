//! Asset lookup: the `AssetCatalog` trait and an in-process registry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::asset::{Asset, AssetClass};
use crate::error::{Error, Result};
use crate::types::Ticker;

/// Point lookup from ticker to asset.
///
/// The optimizer only ever reads through this trait, so any price source
/// (a database, a market-data cache, a test fixture) can stand behind it.
pub trait AssetCatalog {
    fn asset(&self, ticker: &str) -> Option<Asset>;

    /// Look up a ticker, failing with [`Error::UnknownTicker`] when absent.
    fn require(&self, ticker: &str) -> Result<Asset> {
        self.asset(ticker)
            .ok_or_else(|| Error::UnknownTicker(Ticker::new(ticker)))
    }
}

impl<C: AssetCatalog + ?Sized> AssetCatalog for &C {
    fn asset(&self, ticker: &str) -> Option<Asset> {
        (**self).asset(ticker)
    }
}

struct Seed {
    ticker: &'static str,
    class: AssetClass,
    fractional: bool,
    equivalent: Option<&'static str>,
}

const fn seed(
    ticker: &'static str,
    class: AssetClass,
    fractional: bool,
    equivalent: Option<&'static str>,
) -> Seed {
    Seed {
        ticker,
        class,
        fractional,
        equivalent,
    }
}

/// Known asset universe. Every seed starts at unit value; prices are
/// applied afterwards with [`AssetRegistry::update_value`].
const SEEDS: &[Seed] = &[
    seed("CASH", AssetClass::Cash, true, None),
    seed("PROPERTY", AssetClass::Property, true, None),
    seed("BND", AssetClass::Stock, false, None),
    seed("ETHE", AssetClass::Stock, false, Some("ethereum")),
    seed("GBTC", AssetClass::Stock, false, Some("bitcoin")),
    seed("VEA", AssetClass::Stock, false, None),
    seed("VGSLX", AssetClass::Stock, true, Some("VNQ")),
    seed("VNQ", AssetClass::Stock, false, None),
    seed("VTI", AssetClass::Stock, false, None),
    seed("VWO", AssetClass::Stock, false, None),
    seed("VXUS", AssetClass::Stock, false, None),
    seed("bitcoin", AssetClass::Crypto, true, Some("GBTC")),
    seed("ethereum", AssetClass::Crypto, true, Some("ETHE")),
];

/// In-memory [`AssetCatalog`].
#[derive(Clone, Debug, Default)]
pub struct AssetRegistry {
    assets: FxHashMap<Ticker, Asset>,
}

impl AssetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the static seed table.
    pub fn seeded() -> Self {
        SEEDS
            .iter()
            .map(|s| Asset::seed(s.ticker, s.class, s.fractional, s.equivalent))
            .collect()
    }

    /// Insert or replace an asset, returning the previous entry.
    pub fn insert(&mut self, asset: Asset) -> Option<Asset> {
        self.assets.insert(asset.ticker().clone(), asset)
    }

    /// Reprice an existing asset.
    pub fn update_value(
        &mut self,
        ticker: &str,
        value: Decimal,
        updated: DateTime<Utc>,
    ) -> Result<()> {
        let slot = self
            .assets
            .get_mut(ticker)
            .ok_or_else(|| Error::UnknownTicker(Ticker::new(ticker)))?;
        *slot = slot.with_value(value)?.with_updated(updated);
        Ok(())
    }

    pub fn get(&self, ticker: &str) -> Option<&Asset> {
        self.assets.get(ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.assets.contains_key(ticker)
    }

    /// All tickers, sorted.
    pub fn tickers(&self) -> Vec<&Ticker> {
        let mut tickers: Vec<_> = self.assets.keys().collect();
        tickers.sort();
        tickers
    }

    /// All assets, sorted by ticker.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        let mut assets: Vec<_> = self.assets.values().collect();
        assets.sort_by(|a, b| a.ticker().cmp(b.ticker()));
        assets.into_iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<Asset> for AssetRegistry {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        let mut registry = Self::new();
        for asset in iter {
            registry.insert(asset);
        }
        registry
    }
}

impl AssetCatalog for AssetRegistry {
    fn asset(&self, ticker: &str) -> Option<Asset> {
        self.assets.get(ticker).cloned()
    }
}
