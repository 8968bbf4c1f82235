//! One-call rebalancing: build, search, reconcile.

use std::fmt;

use log::info;
use rust_decimal::Decimal;

use crate::catalog::AssetCatalog;
use crate::config::RebalanceConfig;
use crate::error::Result;
use crate::model::{ModelBuilder, ModelWarning, holding_ticker};
use crate::portfolio::Portfolio;
use crate::reconcile::reconcile;
use crate::result::{PositionKey, RebalanceResult};
use crate::search::{Attempt, SearchState, SearchStatus, ToleranceSearch};
use crate::solver::{MicroLpSolver, SolveStatus, Solver};
use crate::types::Ticker;
use crate::valuation::{self, to_f64};

/// Rebalancing entry point.
///
/// Holds the asset catalog, the solver, and the configuration; each call
/// to [`rebalance`](Self::rebalance) reads one portfolio snapshot.
pub struct Rebalancer<C: AssetCatalog, S: Solver = MicroLpSolver> {
    catalog: C,
    solver: S,
    config: RebalanceConfig,
}

impl<C: AssetCatalog> Rebalancer<C, MicroLpSolver> {
    /// Rebalancer with the built-in solver.
    pub fn new(catalog: C, config: RebalanceConfig) -> Result<Self> {
        let solver = MicroLpSolver::new(config.solver);
        Self::with_solver(catalog, solver, config)
    }
}

impl<C: AssetCatalog, S: Solver> Rebalancer<C, S> {
    pub fn with_solver(catalog: C, solver: S, config: RebalanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            solver,
            config,
        })
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    /// Rebalance to completion.
    pub fn rebalance(&self, portfolio: &Portfolio) -> Result<Rebalance> {
        self.rebalance_until(portfolio, |_| true)
    }

    /// Rebalance, consulting `keep_going` before every attempt.
    pub fn rebalance_until<F>(&self, portfolio: &Portfolio, keep_going: F) -> Result<Rebalance>
    where
        F: FnMut(&SearchState) -> bool,
    {
        info!(
            "rebalancing {}: {} accounts, {} allocations",
            portfolio.name(),
            portfolio.account_count(),
            portfolio.allocations().count()
        );
        let portfolio_value = valuation::portfolio_rebalance_value(portfolio, &self.catalog)?;
        let builder = ModelBuilder::new(portfolio, &self.catalog)
            .weights(self.config.objective)
            .unsatisfiable_policy(self.config.unsatisfiable);
        let outcome =
            ToleranceSearch::new(builder, &self.solver, self.config.search).run_until(keep_going)?;

        let mut plan = Rebalance {
            status: outcome.status,
            solve_status: None,
            tolerance: self.config.search.initial_tolerance,
            iterations: outcome.iterations,
            objective: 0.0,
            positions: RebalanceResult::new(),
            unsatisfiable: Vec::new(),
            unenforced: Vec::new(),
            warnings: Vec::new(),
            portfolio_value,
            history: outcome.history,
        };
        if let Some(best) = outcome.best {
            plan.positions = reconcile(&best.program, &best.outcome.values, portfolio)?;
            plan.tolerance = best.program.tolerance;
            plan.objective = best.outcome.objective;
            plan.solve_status = Some(best.outcome.status);
            plan.unsatisfiable = best.program.unsatisfiable;
            plan.unenforced = best.program.unenforced;
            plan.warnings = best.program.warnings;
        }
        Ok(plan)
    }
}

/// Outcome of one rebalance.
#[derive(Clone, Debug)]
pub struct Rebalance {
    pub status: SearchStatus,
    /// Solver status of the chosen attempt.
    pub solve_status: Option<SolveStatus>,
    pub tolerance: f64,
    pub iterations: u32,
    pub objective: f64,
    pub positions: RebalanceResult,
    /// Allocated tickers no account can hold.
    pub unsatisfiable: Vec<Ticker>,
    /// Allocated tickers held only as undesired cash or at zero value.
    pub unenforced: Vec<Ticker>,
    pub warnings: Vec<ModelWarning>,
    /// Value the target bands were computed from.
    pub portfolio_value: Decimal,
    pub history: Vec<Attempt>,
}

/// Current versus target quantity of one position.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionChange {
    pub key: PositionKey,
    pub current: Decimal,
    pub target: Decimal,
    /// `target - current`
    pub delta: Decimal,
}

/// Realized share of one allocated ticker.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationCompliance {
    pub ticker: Ticker,
    pub target_pct: f64,
    pub realized_pct: f64,
    /// `(realized - target) / target`, or the realized share when the
    /// target is zero.
    pub deviation: f64,
}

impl AllocationCompliance {
    /// Whether the realized share lies within `tolerance` of the target.
    pub fn within(&self, tolerance: f64) -> bool {
        self.deviation.abs() <= tolerance
    }
}

impl Rebalance {
    #[inline]
    pub fn is_optimal(&self) -> bool {
        self.status == SearchStatus::Optimal
    }

    /// Per-position trades, in key order.
    pub fn changes(&self, portfolio: &Portfolio) -> Vec<PositionChange> {
        self.positions
            .iter()
            .map(|(key, target)| {
                let current = portfolio
                    .account_by_name(&key.account)
                    .map_or(Decimal::ZERO, |a| a.quantity(key.ticker.as_str()));
                PositionChange {
                    key: key.clone(),
                    current,
                    target,
                    delta: target - current,
                }
            })
            .collect()
    }

    /// Realized allocation per allocated ticker.
    ///
    /// A position counts toward a ticker the same way the target
    /// constraints count it: directly, or through the equivalent ticker in
    /// accounts that cannot hold the ticker itself, and never as cash in an
    /// account that marks cash undesired. Tickers no position can count
    /// toward have no band and are left out. Shares are relative to the
    /// total value of all positions.
    pub fn compliance(
        &self,
        portfolio: &Portfolio,
        catalog: &impl AssetCatalog,
    ) -> Result<Vec<AllocationCompliance>> {
        let mut total = Decimal::ZERO;
        for (key, quantity) in self.positions.iter() {
            total += quantity * catalog.require(key.ticker.as_str())?.value();
        }
        let total = to_f64(total)?;

        let mut report = Vec::new();
        for allocation in portfolio.allocations() {
            let asset = catalog.require(allocation.ticker().as_str())?;
            let mut counted = false;
            let mut value = Decimal::ZERO;
            for account in portfolio.accounts() {
                let Some(held) = holding_ticker(account, &asset) else {
                    continue;
                };
                let held = catalog.require(held.as_str())?;
                if held.is_cash() && account.is_undesired(held.ticker().as_str()) {
                    continue;
                }
                if held.value().is_zero() {
                    continue;
                }
                counted = true;
                if let Some(quantity) = self.positions.get(held.ticker().as_str(), account.name()) {
                    value += quantity * held.value();
                }
            }
            if !counted {
                continue;
            }
            let realized_pct = if total > 0.0 { to_f64(value)? / total } else { 0.0 };
            let target_pct = allocation.percentage();
            let deviation = if target_pct > 0.0 {
                (realized_pct - target_pct) / target_pct
            } else {
                realized_pct
            };
            report.push(AllocationCompliance {
                ticker: allocation.ticker().clone(),
                target_pct,
                realized_pct,
                deviation,
            });
        }
        Ok(report)
    }
}

impl fmt::Display for Rebalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rebalance {} after {} attempts (tolerance {:.2}%, objective {:.4})",
            self.status,
            self.iterations,
            self.tolerance * 100.0,
            self.objective
        )?;
        writeln!(f, "  {:<10} {:<16} {:>16}", "Ticker", "Account", "Target")?;
        for (key, quantity) in self.positions.iter() {
            writeln!(f, "  {:<10} {:<16} {:>16}", key.ticker, key.account, quantity)?;
        }
        for t in &self.unsatisfiable {
            writeln!(f, "  unsatisfiable: {t}")?;
        }
        for t in &self.unenforced {
            writeln!(f, "  unenforced: {t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountType};
    use crate::catalog::AssetRegistry;
    use crate::error::Error;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn registry() -> AssetRegistry {
        let mut reg = AssetRegistry::seeded();
        reg.update_value("GBTC", dec!(40), Utc::now()).unwrap();
        reg.update_value("bitcoin", dec!(40000), Utc::now()).unwrap();
        reg
    }

    /// CASH 40000 plus one GBTC share in a Roth; policy is all bitcoin.
    fn bitcoin_portfolio() -> Portfolio {
        let mut p = Portfolio::new("btc");
        let roth = p
            .add_account(
                Account::new("Roth", AccountType::Roth, false)
                    .with_permissible(["GBTC", "CASH"])
                    .unwrap(),
            )
            .unwrap();
        p.add_holding(roth, "CASH", dec!(40000)).unwrap();
        p.add_holding(roth, "GBTC", dec!(1)).unwrap();
        p.set_allocation([("bitcoin", 1.0)]).unwrap();
        p
    }

    #[test]
    fn equivalent_substitution() {
        let reg = registry();
        let p = bitcoin_portfolio();
        let r = Rebalancer::new(&reg, RebalanceConfig::default())
            .unwrap()
            .rebalance(&p)
            .unwrap();
        assert!(r.is_optimal());
        let gbtc = r.positions.get("GBTC", "Roth").unwrap();
        let value = gbtc * dec!(40);
        assert!((value - dec!(40040)).abs() <= dec!(40));
        assert_eq!(r.portfolio_value, dec!(40040));
    }

    #[test]
    fn changes_and_compliance() {
        let reg = registry();
        let p = bitcoin_portfolio();
        let r = Rebalancer::new(&reg, RebalanceConfig::default())
            .unwrap()
            .rebalance(&p)
            .unwrap();
        let changes = r.changes(&p);
        let gbtc = changes.iter().find(|c| c.key.ticker == "GBTC").unwrap();
        assert_eq!(gbtc.current, dec!(1));
        assert_eq!(gbtc.delta, gbtc.target - dec!(1));
        assert!(changes.windows(2).all(|w| w[0].key < w[1].key));

        let compliance = r.compliance(&p, &reg).unwrap();
        assert_eq!(compliance.len(), 1);
        assert_eq!(compliance[0].ticker, "bitcoin");
        assert!(compliance[0].within(0.01));
    }

    #[test]
    fn invalid_config_rejected() {
        let reg = registry();
        let mut config = RebalanceConfig::default();
        config.search.tolerance_step = -1.0;
        assert!(matches!(
            Rebalancer::new(&reg, config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let reg = registry();
        let p = bitcoin_portfolio();
        let r = Rebalancer::new(&reg, RebalanceConfig::default())
            .unwrap()
            .rebalance_until(&p, |_| false)
            .unwrap();
        assert_eq!(r.status, SearchStatus::Cancelled);
        assert!(r.positions.is_empty());
        assert_eq!(r.solve_status, None);
        assert!(r.changes(&p).is_empty());
    }

    #[test]
    fn display_lists_positions() {
        let reg = registry();
        let p = bitcoin_portfolio();
        let r = Rebalancer::new(&reg, RebalanceConfig::default())
            .unwrap()
            .rebalance(&p)
            .unwrap();
        let text = r.to_string();
        assert!(text.contains("optimal"));
        assert!(text.contains("GBTC"));
    }
}
