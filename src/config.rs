//! Optimizer configuration.

use crate::error::{Error, Result};

/// Tolerance-relaxation schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchConfig {
    /// Band half-width of the first attempt, as a fraction of each target.
    pub initial_tolerance: f64,
    /// Added to the tolerance after every failed attempt.
    pub tolerance_step: f64,
    /// Attempts after the first before giving up.
    pub max_iterations: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_tolerance: 0.0,
            tolerance_step: 0.0125,
            max_iterations: 100,
        }
    }
}

impl SearchConfig {
    /// Tolerance used for the given attempt.
    pub fn tolerance_at(&self, iteration: u32) -> f64 {
        self.initial_tolerance + self.tolerance_step * f64::from(iteration)
    }
}

/// Objective coefficients for priority and undesired positions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ObjectiveWeights {
    pub asset_weight: f64,
    /// Applied instead of `asset_weight` to cash-class assets.
    pub cash_weight: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            asset_weight: 1.0,
            cash_weight: 0.5,
        }
    }
}

/// What to do with an allocated ticker no account can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnsatisfiablePolicy {
    /// Drop its target constraints and report the ticker.
    #[default]
    Skip,
    /// Fail the build with `Error::UnsatisfiableAllocation`.
    Reject,
}

/// Branch-and-bound limits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Relaxations solved per program before giving up.
    pub max_nodes: usize,
    /// Distance from the nearest integer still treated as integral.
    pub integrality_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_nodes: 10_000,
            integrality_tolerance: 1e-6,
        }
    }
}

/// Everything the rebalancer needs besides the portfolio and catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RebalanceConfig {
    pub search: SearchConfig,
    pub objective: ObjectiveWeights,
    pub unsatisfiable: UnsatisfiablePolicy,
    pub solver: SolverConfig,
}

impl RebalanceConfig {
    /// Validate the config. Returns `Error::Config` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if !s.initial_tolerance.is_finite() || s.initial_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "initial_tolerance must be >= 0 and finite, got {}",
                s.initial_tolerance
            )));
        }
        if !s.tolerance_step.is_finite() || s.tolerance_step <= 0.0 {
            return Err(Error::Config(format!(
                "tolerance_step must be > 0 and finite, got {}",
                s.tolerance_step
            )));
        }
        let w = &self.objective;
        if !w.asset_weight.is_finite() || !w.cash_weight.is_finite() {
            return Err(Error::Config("objective weights must be finite".into()));
        }
        if self.solver.max_nodes == 0 {
            return Err(Error::Config("max_nodes must be > 0".into()));
        }
        let tol = self.solver.integrality_tolerance;
        if !tol.is_finite() || tol <= 0.0 || tol >= 0.5 {
            return Err(Error::Config(format!(
                "integrality_tolerance must be in (0, 0.5), got {tol}"
            )));
        }
        Ok(())
    }
}
