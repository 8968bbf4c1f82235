//! Portfolio: accounts plus the target allocation policy.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::types::{AccountId, Ticker};

/// Allowed deviation of the allocation sum from 1.
pub const ALLOCATION_EPSILON: f64 = 1e-9;

/// Target share of total portfolio value for one ticker.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    ticker: Ticker,
    percentage: f64,
}

impl Allocation {
    #[inline]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Fraction of the portfolio, in `[0, 1]`.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }
}

/// A named set of accounts rebalanced together.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portfolio {
    name: String,
    accounts: BTreeMap<AccountId, Account>,
    allocations: BTreeMap<Ticker, Allocation>,
    next_id: u64,
}

impl Portfolio {
    /// Empty portfolio with the default all-cash policy.
    pub fn new(name: impl Into<String>) -> Self {
        let cash = Ticker::cash();
        let mut allocations = BTreeMap::new();
        allocations.insert(
            cash.clone(),
            Allocation {
                ticker: cash,
                percentage: 1.0,
            },
        );
        Self {
            name: name.into(),
            accounts: BTreeMap::new(),
            allocations,
            next_id: 1,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Accounts ===

    /// Add an account and assign it a fresh id. Names must be unique.
    pub fn add_account(&mut self, mut account: Account) -> Result<AccountId> {
        if self.account_by_name(account.name()).is_some() {
            return Err(Error::DuplicateAccount(account.name().to_string()));
        }
        let id = AccountId(self.next_id);
        self.next_id += 1;
        account.set_id(id);
        self.accounts.insert(id, account);
        Ok(id)
    }

    pub fn remove_account(&mut self, id: AccountId) -> Result<Account> {
        self.accounts.remove(&id).ok_or(Error::UnknownAccount(id))
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.name() == name)
    }

    /// Accounts in id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Add to a holding in the given account.
    pub fn add_holding(
        &mut self,
        id: AccountId,
        ticker: impl Into<Ticker>,
        quantity: Decimal,
    ) -> Result<()> {
        self.accounts
            .get_mut(&id)
            .ok_or(Error::UnknownAccount(id))?
            .add_holding(ticker, quantity)
    }

    // === Allocation policy ===

    /// Replace the allocation policy.
    ///
    /// Percentages must be finite, non-negative, name each ticker once, and
    /// sum to 1 within [`ALLOCATION_EPSILON`]. On error the previous policy
    /// is kept.
    pub fn set_allocation<I, T>(&mut self, allocations: I) -> Result<()>
    where
        I: IntoIterator<Item = (T, f64)>,
        T: Into<Ticker>,
    {
        let mut next = BTreeMap::new();
        let mut total = 0.0;
        for (ticker, percentage) in allocations {
            let ticker = ticker.into();
            if !percentage.is_finite() || percentage < 0.0 {
                return Err(Error::InvalidAllocation(format!(
                    "{ticker}: percentage must be a finite value >= 0, got {percentage}"
                )));
            }
            if next.contains_key(&ticker) {
                return Err(Error::InvalidAllocation(format!("{ticker} listed twice")));
            }
            total += percentage;
            next.insert(ticker.clone(), Allocation { ticker, percentage });
        }
        if (total - 1.0).abs() > ALLOCATION_EPSILON {
            return Err(Error::InvalidAllocation(format!(
                "percentages sum to {total}, expected 1"
            )));
        }
        self.allocations = next;
        Ok(())
    }

    /// Allocations in ticker order.
    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    pub fn allocation(&self, ticker: &str) -> Option<f64> {
        self.allocations.get(ticker).map(Allocation::percentage)
    }

    pub fn is_allocated(&self, ticker: &str) -> bool {
        self.allocations.contains_key(ticker)
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Portfolio {} ({} accounts)", self.name, self.accounts.len())?;
        for account in self.accounts.values() {
            writeln!(
                f,
                "  {} [{}{}]",
                account.name(),
                account.kind(),
                if account.allow_fractional() { ", fractional" } else { "" }
            )?;
            for h in account.holdings() {
                writeln!(f, "    {:<10} {:>14}", h.ticker(), h.quantity())?;
            }
        }
        writeln!(f, "  Allocation:")?;
        for a in self.allocations.values() {
            writeln!(f, "    {:<10} {:>7.2}%", a.ticker(), a.percentage() * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;
    use rust_decimal_macros::dec;

    fn roth() -> Account {
        Account::new("Roth", AccountType::Roth, false)
            .with_permissible(["VTI", "CASH"])
            .unwrap()
    }

    #[test]
    fn default_policy_is_all_cash() {
        let p = Portfolio::new("test");
        assert_eq!(p.allocation("CASH"), Some(1.0));
        assert_eq!(p.allocations().count(), 1);
    }

    #[test]
    fn add_account_assigns_ids() {
        let mut p = Portfolio::new("test");
        let a = p.add_account(roth()).unwrap();
        let b = p
            .add_account(Account::new("INV", AccountType::Taxable, false))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(p.account(a).unwrap().id(), a);
        assert_eq!(p.account_by_name("INV").unwrap().id(), b);
    }

    #[test]
    fn duplicate_account_name_rejected() {
        let mut p = Portfolio::new("test");
        p.add_account(roth()).unwrap();
        let err = p.add_account(roth()).unwrap_err();
        assert_eq!(err, Error::DuplicateAccount("Roth".into()));
    }

    #[test]
    fn remove_account() {
        let mut p = Portfolio::new("test");
        let id = p.add_account(roth()).unwrap();
        assert_eq!(p.remove_account(id).unwrap().name(), "Roth");
        assert_eq!(p.remove_account(id), Err(Error::UnknownAccount(id)));
    }

    #[test]
    fn add_holding_through_portfolio() {
        let mut p = Portfolio::new("test");
        let id = p.add_account(roth()).unwrap();
        p.add_holding(id, "VTI", dec!(10)).unwrap();
        assert_eq!(p.account(id).unwrap().quantity("VTI"), dec!(10));
        assert!(p.add_holding(AccountId(99), "VTI", dec!(1)).is_err());
    }

    #[test]
    fn set_allocation_valid() {
        let mut p = Portfolio::new("test");
        p.set_allocation([("VTI", 0.6), ("BND", 0.4)]).unwrap();
        assert_eq!(p.allocation("VTI"), Some(0.6));
        assert!(!p.is_allocated("CASH"));
    }

    #[test]
    fn set_allocation_bad_sum_keeps_previous() {
        let mut p = Portfolio::new("test");
        let err = p.set_allocation([("VTI", 0.6), ("BND", 0.3)]).unwrap_err();
        assert!(matches!(err, Error::InvalidAllocation(_)));
        assert_eq!(p.allocation("CASH"), Some(1.0));
    }

    #[test]
    fn set_allocation_rejects_duplicates_and_negatives() {
        let mut p = Portfolio::new("test");
        assert!(p.set_allocation([("VTI", 0.5), ("VTI", 0.5)]).is_err());
        assert!(p.set_allocation([("VTI", 1.2), ("BND", -0.2)]).is_err());
        assert!(p.set_allocation([("VTI", f64::NAN)]).is_err());
    }

    #[test]
    fn allocation_sum_tolerance() {
        let mut p = Portfolio::new("test");
        p.set_allocation([
            ("VTI", 0.3725),
            ("VXUS", 0.3825),
            ("VNQ", 0.045),
            ("BND", 0.1),
            ("CASH", 0.1),
        ])
        .unwrap();
        assert_eq!(p.allocations().count(), 5);
    }
}
