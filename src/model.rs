//! Linear program construction from a portfolio snapshot.
//!
//! One [`LinearProgram`] is built per solve. It holds one decision variable
//! per (account, permissible ticker) pair, a value-conservation equality per
//! account, a floor/ceiling pair per allocated ticker, and a linear objective
//! that rewards priority positions and penalises undesired ones.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::account::Account;
use crate::asset::Asset;
use crate::catalog::AssetCatalog;
use crate::config::{ObjectiveWeights, UnsatisfiablePolicy};
use crate::error::{Error, Result};
use crate::portfolio::Portfolio;
use crate::result::PositionKey;
use crate::types::{AccountId, Ticker};
use crate::valuation::{self, to_f64};

/// Index of a variable within its program.
pub type VarId = usize;

/// Smallest half-width of a target band, relative to the target.
pub const MIN_BAND_WIDTH: f64 = 1e-9;

/// Whether a variable may take fractional values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Continuous,
    Integer,
}

/// Post-rebalance quantity of one asset in one account.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub key: PositionKey,
    pub account: AccountId,
    pub domain: Domain,
    pub lower: f64,
    pub upper: f64,
    /// Unit value of the asset.
    pub price: f64,
}

impl Variable {
    #[inline]
    pub fn is_integer(&self) -> bool {
        self.domain == Domain::Integer
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Eq => write!(f, "="),
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
        }
    }
}

/// What a constraint enforces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Account value is preserved.
    Conservation(AccountId),
    /// Ticker value at or above its lower band.
    TargetFloor(Ticker),
    /// Ticker value at or below its upper band.
    TargetCeiling(Ticker),
}

/// `Σ coeff·x  (relation)  rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// Left-hand side for the given values.
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v]).sum()
    }

    /// Whether `values` satisfy the constraint within `eps`.
    pub fn is_satisfied(&self, values: &[f64], eps: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Eq => (lhs - self.rhs).abs() <= eps,
            Relation::Le => lhs <= self.rhs + eps,
            Relation::Ge => lhs >= self.rhs - eps,
        }
    }
}

/// Which tickers the objective was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectiveScope {
    /// Priority/undesired tickers that appear in the allocation policy.
    Allocated,
    /// No policy ticker had a term; every priority/undesired ticker used.
    Unrestricted,
    /// No terms at all. Any feasible point scores 0.
    Empty,
}

/// Which account policy set a warning refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicySet {
    Priority,
    Undesired,
}

/// Non-fatal configuration problem found while building.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelWarning {
    /// A priority or undesired ticker the account cannot hold. It is skipped.
    NotPermissible {
        account: String,
        ticker: Ticker,
        set: PolicySet,
    },
}

impl fmt::Display for ModelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelWarning::NotPermissible {
                account,
                ticker,
                set,
            } => {
                let set = match set {
                    PolicySet::Priority => "priority",
                    PolicySet::Undesired => "undesired",
                };
                write!(
                    f,
                    "{set} ticker {ticker} is not permissible in account {account}; ignored"
                )
            }
        }
    }
}

/// Variables, constraints, and objective for one solve.
#[derive(Clone, Debug)]
pub struct LinearProgram {
    pub tolerance: f64,
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
    /// Maximised.
    pub objective: Vec<(VarId, f64)>,
    pub scope: ObjectiveScope,
    /// Allocated tickers no account can hold (Skip policy only).
    pub unsatisfiable: Vec<Ticker>,
    /// Allocated tickers held only as undesired cash or at zero value.
    /// No band is built for them.
    pub unenforced: Vec<Ticker>,
    pub warnings: Vec<ModelWarning>,
    /// Portfolio value the target bands were computed from.
    pub portfolio_value: Decimal,
    index: FxHashMap<PositionKey, VarId>,
}

impl LinearProgram {
    /// Empty program with no variables and an empty objective.
    pub fn new(tolerance: f64, portfolio_value: Decimal) -> Self {
        Self {
            tolerance,
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: Vec::new(),
            scope: ObjectiveScope::Empty,
            unsatisfiable: Vec::new(),
            unenforced: Vec::new(),
            warnings: Vec::new(),
            portfolio_value,
            index: FxHashMap::default(),
        }
    }

    /// Append a variable and index it by key.
    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        let id = self.variables.len();
        self.index.insert(variable.key.clone(), id);
        self.variables.push(variable);
        id
    }

    /// Variable for `ticker` in the named account.
    pub fn var(&self, ticker: &str, account: &str) -> Option<VarId> {
        self.index.get(&PositionKey::new(ticker, account)).copied()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().map(|&(v, c)| c * values[v]).sum()
    }

    /// Whether `values` satisfy every bound, constraint, and integrality
    /// requirement within `eps`.
    pub fn is_feasible(&self, values: &[f64], eps: f64) -> bool {
        values.len() == self.variables.len()
            && self.variables.iter().zip(values).all(|(var, &x)| {
                x >= var.lower - eps
                    && x <= var.upper + eps
                    && (!var.is_integer() || (x - x.round()).abs() <= eps)
            })
            && self.constraints.iter().all(|c| c.is_satisfied(values, eps))
    }

    pub fn integer_count(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }
}

/// Builds a [`LinearProgram`] from a portfolio snapshot.
///
/// The builder only reads the portfolio and catalog; call
/// [`build`](Self::build) once per tolerance.
pub struct ModelBuilder<'a, C: AssetCatalog> {
    portfolio: &'a Portfolio,
    catalog: &'a C,
    weights: ObjectiveWeights,
    policy: UnsatisfiablePolicy,
}

impl<'a, C: AssetCatalog> ModelBuilder<'a, C> {
    pub fn new(portfolio: &'a Portfolio, catalog: &'a C) -> Self {
        Self {
            portfolio,
            catalog,
            weights: ObjectiveWeights::default(),
            policy: UnsatisfiablePolicy::default(),
        }
    }

    pub fn weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn unsatisfiable_policy(mut self, policy: UnsatisfiablePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the program for `tolerance`.
    ///
    /// Tolerance must be finite and `>= 0`. Values of 1 or more are allowed;
    /// lower bands then clamp at zero.
    pub fn build(&self, tolerance: f64) -> Result<LinearProgram> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::Config(format!(
                "tolerance must be >= 0 and finite, got {tolerance}"
            )));
        }
        let assets = self.resolve_assets()?;
        let portfolio_value = valuation::portfolio_rebalance_value(self.portfolio, self.catalog)?;

        let mut program = LinearProgram::new(tolerance, portfolio_value);

        for account in self.portfolio.accounts() {
            self.add_account(&mut program, account, &assets)?;
        }
        self.add_targets(&mut program, &assets, to_f64(portfolio_value)?)?;
        self.add_objective(&mut program, &assets);
        Ok(program)
    }

    /// Resolve every ticker the snapshot names.
    fn resolve_assets(&self) -> Result<FxHashMap<Ticker, Asset>> {
        let mut assets = FxHashMap::default();
        let mut resolve = |ticker: &Ticker| -> Result<()> {
            if !assets.contains_key(ticker) {
                assets.insert(ticker.clone(), self.catalog.require(ticker.as_str())?);
            }
            Ok(())
        };
        for account in self.portfolio.accounts() {
            for h in account.holdings() {
                resolve(h.ticker())?;
            }
            for t in account
                .permissible()
                .iter()
                .chain(account.priority())
                .chain(account.undesired())
            {
                resolve(t)?;
            }
        }
        for a in self.portfolio.allocations() {
            resolve(a.ticker())?;
        }
        Ok(assets)
    }

    /// Variables and the conservation constraint for one account.
    fn add_account(
        &self,
        program: &mut LinearProgram,
        account: &Account,
        assets: &FxHashMap<Ticker, Asset>,
    ) -> Result<()> {
        let account_value = to_f64(valuation::rebalance_value(account, self.catalog)?)?;
        let mut terms = Vec::with_capacity(account.permissible().len());

        for ticker in account.permissible() {
            let asset = lookup(assets, ticker)?;
            let price = to_f64(asset.value())?;
            let domain = if account.allow_fractional() || asset.is_cash() {
                Domain::Continuous
            } else {
                Domain::Integer
            };
            let (lower, upper) = if price > 0.0 {
                let bound = account_value / price;
                let bound = match domain {
                    Domain::Integer => bound.floor(),
                    Domain::Continuous => bound,
                };
                (0.0, bound.max(0.0))
            } else {
                // A worthless asset cannot move value; hold it where it is.
                let held = account.quantity(ticker.as_str());
                let held = match domain {
                    Domain::Integer => held.trunc(),
                    Domain::Continuous => held,
                };
                let held = to_f64(held)?;
                (held, held)
            };

            let id = program.add_variable(Variable {
                key: PositionKey::new(ticker.clone(), account.name()),
                account: account.id(),
                domain,
                lower,
                upper,
                price,
            });
            if price != 0.0 {
                terms.push((id, price));
            }
        }

        program.constraints.push(Constraint {
            kind: ConstraintKind::Conservation(account.id()),
            terms,
            relation: Relation::Eq,
            rhs: account_value,
        });
        Ok(())
    }

    /// Floor and ceiling constraints per allocated ticker.
    ///
    /// Each band is at least `MIN_BAND_WIDTH * max(target, 1)` wide on
    /// either side, so tolerance 0 stays feasible under float rounding.
    fn add_targets(
        &self,
        program: &mut LinearProgram,
        assets: &FxHashMap<Ticker, Asset>,
        total: f64,
    ) -> Result<()> {
        let tolerance = program.tolerance;
        for allocation in self.portfolio.allocations() {
            let ticker = allocation.ticker();
            let asset = lookup(assets, ticker)?;
            let mut eligible = false;
            let mut terms = Vec::new();

            for account in self.portfolio.accounts() {
                let Some(held) = holding_ticker(account, asset) else {
                    continue;
                };
                let held = lookup(assets, held)?;
                eligible = true;
                if held.is_cash() && account.is_undesired(held.ticker().as_str()) {
                    continue;
                }
                if let Some(var) = program.var(held.ticker().as_str(), account.name()) {
                    let price = program.variables[var].price;
                    if price != 0.0 {
                        terms.push((var, price));
                    }
                }
            }

            if !eligible {
                match self.policy {
                    UnsatisfiablePolicy::Reject => {
                        return Err(Error::UnsatisfiableAllocation(ticker.clone()));
                    }
                    UnsatisfiablePolicy::Skip => {
                        program.unsatisfiable.push(ticker.clone());
                        continue;
                    }
                }
            }
            if terms.is_empty() {
                // Only undesired cash or worthless positions could count.
                program.unenforced.push(ticker.clone());
                continue;
            }

            let target = allocation.percentage() * total;
            let half_width = (target * tolerance).max(MIN_BAND_WIDTH * target.max(1.0));
            program.constraints.push(Constraint {
                kind: ConstraintKind::TargetFloor(ticker.clone()),
                terms: terms.clone(),
                relation: Relation::Ge,
                rhs: (target - half_width).max(0.0),
            });
            program.constraints.push(Constraint {
                kind: ConstraintKind::TargetCeiling(ticker.clone()),
                terms,
                relation: Relation::Le,
                rhs: target + half_width,
            });
        }
        Ok(())
    }

    /// Priority/undesired objective, restricted to policy tickers when
    /// that leaves any terms.
    fn add_objective(&self, program: &mut LinearProgram, assets: &FxHashMap<Ticker, Asset>) {
        let policy: BTreeSet<&Ticker> = self
            .portfolio
            .allocations()
            .flat_map(|a| {
                let eq = assets.get(a.ticker()).and_then(Asset::equivalent);
                std::iter::once(a.ticker()).chain(eq)
            })
            .collect();

        let mut restricted: BTreeMap<VarId, f64> = BTreeMap::new();
        let mut unrestricted: BTreeMap<VarId, f64> = BTreeMap::new();

        for account in self.portfolio.accounts() {
            let sets = [
                (PolicySet::Priority, account.priority(), 1.0),
                (PolicySet::Undesired, account.undesired(), -1.0),
            ];
            for (set, tickers, sign) in sets {
                for ticker in tickers {
                    let Some(var) = program.var(ticker.as_str(), account.name()) else {
                        program.warnings.push(ModelWarning::NotPermissible {
                            account: account.name().to_string(),
                            ticker: ticker.clone(),
                            set,
                        });
                        continue;
                    };
                    let weight = match assets.get(ticker) {
                        Some(a) if a.is_cash() => self.weights.cash_weight,
                        _ => self.weights.asset_weight,
                    };
                    *unrestricted.entry(var).or_default() += sign * weight;
                    if policy.contains(ticker) {
                        *restricted.entry(var).or_default() += sign * weight;
                    }
                }
            }
        }

        let nonzero = |terms: BTreeMap<VarId, f64>| -> Vec<(VarId, f64)> {
            terms.into_iter().filter(|&(_, c)| c != 0.0).collect()
        };
        let restricted = nonzero(restricted);
        let unrestricted = nonzero(unrestricted);
        (program.scope, program.objective) = if !restricted.is_empty() {
            (ObjectiveScope::Allocated, restricted)
        } else if !unrestricted.is_empty() {
            (ObjectiveScope::Unrestricted, unrestricted)
        } else {
            debug!(
                "portfolio {}: no priority or undesired positions",
                self.portfolio.name()
            );
            (ObjectiveScope::Empty, Vec::new())
        };
    }
}

/// Ticker through which `account` holds `asset`: the asset itself when
/// permissible, else its equivalent when that is.
pub(crate) fn holding_ticker<'t>(account: &Account, asset: &'t Asset) -> Option<&'t Ticker> {
    if account.is_permissible(asset.ticker().as_str()) {
        Some(asset.ticker())
    } else {
        asset
            .equivalent()
            .filter(|eq| account.is_permissible(eq.as_str()))
    }
}

fn lookup<'m>(assets: &'m FxHashMap<Ticker, Asset>, ticker: &Ticker) -> Result<&'m Asset> {
    assets
        .get(ticker)
        .ok_or_else(|| Error::UnknownTicker(ticker.clone()))
}
