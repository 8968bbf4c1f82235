//! # rebalanced
//!
//! Multi-account portfolio rebalancing with whole-share constraints.
//!
//! Given accounts, their holdings, and a target allocation, the optimizer
//! picks a post-rebalance quantity for every (account, eligible asset) pair
//! so that:
//!
//! - each account keeps its value (no transfers between accounts),
//! - each allocated ticker lands within a tolerance band of its target,
//! - whole-share accounts hold whole shares of non-cash assets,
//!
//! while preferring each account's priority assets and avoiding its
//! undesired ones.
//!
//! ## Quick Start
//!
//! ```
//! use rebalanced::{Account, AccountType, AssetRegistry, Portfolio, RebalanceConfig, Rebalancer};
//! use rust_decimal::Decimal;
//!
//! let mut assets = AssetRegistry::seeded();
//! assets.update_value("GBTC", Decimal::from(40), chrono::Utc::now())?;
//!
//! let mut portfolio = Portfolio::new("family");
//! let roth = portfolio.add_account(
//!     Account::new("Roth", AccountType::Roth, false).with_permissible(["GBTC", "CASH"])?,
//! )?;
//! portfolio.add_holding(roth, "CASH", Decimal::from(40_000))?;
//! portfolio.add_holding(roth, "GBTC", Decimal::ONE)?;
//!
//! // GBTC stands in for bitcoin in accounts that cannot hold the coin.
//! portfolio.set_allocation([("bitcoin", 1.0)])?;
//!
//! let plan = Rebalancer::new(&assets, RebalanceConfig::default())?.rebalance(&portfolio)?;
//! assert!(plan.is_optimal());
//! assert_eq!(plan.positions.get("GBTC", "Roth"), Some(Decimal::from(1001)));
//! # Ok::<(), rebalanced::Error>(())
//! ```
//!
//! ## Tolerance search
//!
//! The first attempt demands an exact match (tolerance 0). Every failed
//! attempt widens each ticker's band by `tolerance_step` until the solver
//! proves an optimum with a positive objective or the iteration cap is
//! reached. In the latter case the result is tagged
//! [`SearchStatus::Degraded`] and carries the tightest solution found.
//!
//! | Setting | Default |
//! |---------|---------|
//! | `initial_tolerance` | 0 |
//! | `tolerance_step` | 0.0125 |
//! | `max_iterations` | 100 |
//! | `cash_weight` | 0.5 |
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for the data model, search attempts,
//!   and [`RebalanceResult`].

pub mod account;
pub mod asset;
pub mod catalog;
pub mod config;
mod error;
pub mod model;
pub mod portfolio;
pub mod rebalance;
pub mod reconcile;
pub mod result;
pub mod search;
pub mod solver;
mod types;
pub mod valuation;

// Re-export public API
pub use account::{Account, AccountType, Holding};
pub use asset::{Asset, AssetClass};
pub use catalog::{AssetCatalog, AssetRegistry};
pub use config::{ObjectiveWeights, RebalanceConfig, SearchConfig, SolverConfig, UnsatisfiablePolicy};
pub use error::{Error, Result};
pub use model::{LinearProgram, ModelBuilder, ModelWarning, ObjectiveScope};
pub use portfolio::{Allocation, Portfolio};
pub use rebalance::{AllocationCompliance, PositionChange, Rebalance, Rebalancer};
pub use result::{PositionKey, RebalanceResult};
pub use search::{SearchOutcome, SearchState, SearchStatus, ToleranceSearch};
pub use solver::{MicroLpSolver, SolveOutcome, SolveStatus, Solver};
pub use types::{AccountId, CASH, Ticker};
