//! Portfolio snapshot (snapshot.json) loading and validation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rebalanced::{Account, AccountType, Asset, AssetClass, AssetRegistry, Portfolio, Ticker};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};

/// A portfolio snapshot: accounts, holdings, prices, and the target policy.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub name: String,
    /// When the prices were taken. Defaults to load time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Prices and overrides on top of the seed registry.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    pub accounts: Vec<AccountEntry>,
    /// Ticker to fraction of total value. Empty keeps the all-cash default.
    #[serde(default)]
    pub allocations: BTreeMap<String, f64>,
}

/// One asset price, optionally overriding the seed's attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetEntry {
    pub ticker: String,
    pub value: Decimal,
    /// Required for tickers the seed registry does not know.
    #[serde(default)]
    pub class: Option<AssetClass>,
    #[serde(default)]
    pub fractional: Option<bool>,
    #[serde(default)]
    pub equivalent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub fractional: bool,
    pub permissible: Vec<String>,
    /// Overrides the account type's default priority set.
    #[serde(default)]
    pub priority: Option<Vec<String>>,
    /// Overrides the account type's default undesired set.
    #[serde(default)]
    pub undesired: Option<Vec<String>>,
    #[serde(default)]
    pub holdings: BTreeMap<String, Decimal>,
}

impl Snapshot {
    /// Load and validate a snapshot.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::SnapshotRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Structural checks. Ticker references are resolved later, against
    /// the registry.
    fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::Snapshot("accounts list is empty".into()));
        }

        let mut seen = HashSet::new();
        for a in &self.accounts {
            if a.name.is_empty() {
                return Err(Error::Snapshot("empty account name".into()));
            }
            if !seen.insert(a.name.as_str()) {
                return Err(Error::Snapshot(format!("duplicate account: {}", a.name)));
            }
        }

        let mut seen = HashSet::new();
        for asset in &self.assets {
            if asset.ticker.is_empty() {
                return Err(Error::Snapshot("empty ticker".into()));
            }
            if !seen.insert(asset.ticker.as_str()) {
                return Err(Error::Snapshot(format!("duplicate asset: {}", asset.ticker)));
            }
        }
        Ok(())
    }

    /// Seed registry overlaid with this snapshot's prices and overrides.
    pub fn registry(&self) -> Result<AssetRegistry> {
        let mut registry = AssetRegistry::seeded();
        let updated = self.timestamp.unwrap_or_else(Utc::now);

        for entry in &self.assets {
            let asset = match (registry.get(&entry.ticker), entry.class) {
                (Some(seed), None) => seed.with_value(entry.value)?,
                (_, Some(class)) => {
                    let asset = Asset::new(entry.ticker.as_str(), entry.value, class)?;
                    // keep the seed's equivalence unless overridden
                    match registry.get(&entry.ticker) {
                        Some(seed) => asset.with_equivalent(seed.equivalent().cloned())?,
                        None => asset,
                    }
                }
                (None, None) => {
                    return Err(Error::Snapshot(format!(
                        "asset {} is not in the seed registry and needs a class",
                        entry.ticker
                    )));
                }
            };
            let asset = match entry.fractional {
                Some(f) => asset.with_fractional(f),
                None => asset,
            };
            let asset = match &entry.equivalent {
                Some(eq) => asset.with_equivalent(Some(Ticker::new(eq.as_str())))?,
                None => asset,
            };
            registry.insert(asset.with_updated(updated));
        }
        Ok(registry)
    }

    /// Build the portfolio, including holdings and the allocation policy.
    pub fn portfolio(&self) -> Result<Portfolio> {
        let mut portfolio = Portfolio::new(self.name.as_str());

        for entry in &self.accounts {
            let mut account = Account::new(entry.name.as_str(), entry.kind, entry.fractional)
                .with_permissible(entry.permissible.iter().map(String::as_str))?;
            if let Some(priority) = &entry.priority {
                account.set_priority(priority.iter().map(String::as_str));
            }
            if let Some(undesired) = &entry.undesired {
                account.set_undesired(undesired.iter().map(String::as_str));
            }
            let id = portfolio.add_account(account)?;
            for (ticker, quantity) in &entry.holdings {
                portfolio.add_holding(id, ticker.as_str(), *quantity)?;
            }
        }

        if !self.allocations.is_empty() {
            portfolio.set_allocation(self.allocations.iter().map(|(t, w)| (t.as_str(), *w)))?;
        }
        Ok(portfolio)
    }
}
