//! Tolerance-relaxation search.
//!
//! Each attempt rebuilds the program at the current tolerance and solves
//! it. The first proven optimum with a positive objective wins; otherwise
//! the band is widened by one step and the search tries again, up to the
//! iteration cap.

use std::fmt;

use log::{debug, info, warn};

use crate::catalog::AssetCatalog;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::model::{LinearProgram, ModelBuilder, ObjectiveScope};
use crate::solver::{SolveOutcome, SolveStatus, Solver};

/// How the search ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SearchStatus {
    /// Optimal with a positive objective.
    Optimal,
    /// Iteration cap exhausted; the best available attempt is returned.
    Degraded,
    /// Stopped by the caller between attempts.
    Cancelled,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Optimal => write!(f, "optimal"),
            SearchStatus::Degraded => write!(f, "degraded"),
            SearchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Loop state, visible to the cancellation predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchState {
    /// Tolerance of the next attempt.
    pub tolerance: f64,
    /// Attempts made so far.
    pub iteration: u32,
    pub last_status: Option<SolveStatus>,
    pub last_objective: f64,
}

/// Summary of one attempt.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attempt {
    pub iteration: u32,
    pub tolerance: f64,
    pub status: SolveStatus,
    pub objective: f64,
}

/// A program together with the solver's answer to it.
#[derive(Clone, Debug)]
pub struct Solved {
    pub iteration: u32,
    pub program: LinearProgram,
    pub outcome: SolveOutcome,
}

/// Result of a search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Solves performed.
    pub iterations: u32,
    /// Winning or best available attempt. `None` only when cancelled
    /// before the first attempt.
    pub best: Option<Solved>,
    pub history: Vec<Attempt>,
}

impl SearchOutcome {
    /// Tolerance of the chosen attempt.
    pub fn tolerance(&self) -> Option<f64> {
        self.best.as_ref().map(|s| s.program.tolerance)
    }

    pub fn objective(&self) -> Option<f64> {
        self.best
            .as_ref()
            .filter(|s| s.outcome.status.has_solution())
            .map(|s| s.outcome.objective)
    }
}

/// Drives build/solve cycles with a widening tolerance band.
pub struct ToleranceSearch<'a, C: AssetCatalog, S: Solver> {
    builder: ModelBuilder<'a, C>,
    solver: &'a S,
    config: SearchConfig,
}

impl<'a, C: AssetCatalog, S: Solver> ToleranceSearch<'a, C, S> {
    pub fn new(builder: ModelBuilder<'a, C>, solver: &'a S, config: SearchConfig) -> Self {
        Self {
            builder,
            solver,
            config,
        }
    }

    /// Run to completion.
    pub fn run(&self) -> Result<SearchOutcome> {
        self.run_until(|_| true)
    }

    /// Run while `keep_going` returns true. The predicate is consulted
    /// before every attempt.
    ///
    /// Build errors (unknown tickers, rejected allocations) abort the
    /// search. Solver failures never do.
    pub fn run_until<F>(&self, mut keep_going: F) -> Result<SearchOutcome>
    where
        F: FnMut(&SearchState) -> bool,
    {
        let mut state = SearchState {
            tolerance: self.config.initial_tolerance,
            iteration: 0,
            last_status: None,
            last_objective: 0.0,
        };
        let mut history = Vec::new();
        let mut first_optimal: Option<Solved> = None;
        let mut first_feasible: Option<Solved> = None;
        let mut last: Option<Solved> = None;

        let status = loop {
            if !keep_going(&state) {
                info!("search cancelled after {} attempts", state.iteration);
                break SearchStatus::Cancelled;
            }

            let program = self.builder.build(state.tolerance)?;
            if state.iteration == 0 {
                for w in &program.warnings {
                    warn!("{w}");
                }
                for t in &program.unsatisfiable {
                    warn!("allocation for {t} cannot be held by any account; skipped");
                }
                for t in &program.unenforced {
                    warn!("allocation for {t} has no position that counts toward it; skipped");
                }
                if program.scope == ObjectiveScope::Empty {
                    warn!("objective is empty; no attempt can succeed");
                }
            }

            let outcome = self.solver.solve(&program);
            debug!(
                "attempt {} tolerance={:.4} status={} objective={:.6}",
                state.iteration, state.tolerance, outcome.status, outcome.objective
            );
            history.push(Attempt {
                iteration: state.iteration,
                tolerance: state.tolerance,
                status: outcome.status,
                objective: outcome.objective,
            });
            state.last_status = Some(outcome.status);
            state.last_objective = outcome.objective;

            let success = outcome.status == SolveStatus::Optimal && outcome.objective > 0.0;
            let solved = Solved {
                iteration: state.iteration,
                program,
                outcome,
            };
            state.iteration += 1;

            if success {
                info!(
                    "optimal after {} attempts at tolerance {:.4} (objective {:.6})",
                    state.iteration, solved.program.tolerance, solved.outcome.objective
                );
                return Ok(SearchOutcome {
                    status: SearchStatus::Optimal,
                    iterations: state.iteration,
                    best: Some(solved),
                    history,
                });
            }

            let status = solved.outcome.status;
            match status {
                SolveStatus::Optimal if first_optimal.is_none() => first_optimal = Some(solved),
                SolveStatus::Feasible if first_feasible.is_none() => {
                    first_feasible = Some(solved)
                }
                _ => last = Some(solved),
            }

            if state.iteration > self.config.max_iterations {
                break SearchStatus::Degraded;
            }
            state.tolerance = self.config.tolerance_at(state.iteration);
        };

        let best = first_optimal.or(first_feasible).or(last);
        if status == SearchStatus::Degraded {
            warn!(
                "no positive optimum within {} attempts; returning best available ({})",
                state.iteration,
                best.as_ref()
                    .map_or(SolveStatus::Infeasible, |s| s.outcome.status)
            );
        }
        Ok(SearchOutcome {
            status,
            iterations: state.iteration,
            best,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountType};
    use crate::catalog::AssetRegistry;
    use crate::error::Error;
    use crate::portfolio::Portfolio;
    use crate::solver::MicroLpSolver;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::cell::Cell;

    /// Returns a fixed status for every program, counting calls.
    struct Scripted {
        status: SolveStatus,
        objective: f64,
        calls: Cell<u32>,
    }

    impl Scripted {
        fn new(status: SolveStatus, objective: f64) -> Self {
            Self {
                status,
                objective,
                calls: Cell::new(0),
            }
        }
    }

    impl Solver for Scripted {
        fn solve(&self, program: &LinearProgram) -> SolveOutcome {
            self.calls.set(self.calls.get() + 1);
            SolveOutcome {
                status: self.status,
                objective: self.objective,
                values: vec![0.0; program.variables.len()],
            }
        }
    }

    fn registry() -> AssetRegistry {
        let mut reg = AssetRegistry::seeded();
        reg.update_value("GBTC", dec!(40), Utc::now()).unwrap();
        reg
    }

    fn portfolio() -> Portfolio {
        let mut p = Portfolio::new("test");
        let roth = p
            .add_account(
                Account::new("Roth", AccountType::Roth, true)
                    .with_permissible(["GBTC", "CASH"])
                    .unwrap(),
            )
            .unwrap();
        p.add_holding(roth, "CASH", dec!(4000)).unwrap();
        p.set_allocation([("bitcoin", 1.0)]).unwrap();
        p
    }

    fn config(max_iterations: u32) -> SearchConfig {
        SearchConfig {
            max_iterations,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn stops_at_first_positive_optimum() {
        let reg = registry();
        let p = portfolio();
        let solver = MicroLpSolver::default();
        let search = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, config(100));
        let out = search.run().unwrap();
        assert_eq!(out.status, SearchStatus::Optimal);
        assert!(out.objective().unwrap() > 0.0);
        assert_eq!(out.iterations as usize, out.history.len());
    }

    #[test]
    fn exhausts_cap_with_cap_plus_one_solves() {
        let reg = registry();
        let p = portfolio();
        let solver = Scripted::new(SolveStatus::Infeasible, 0.0);
        let search = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, config(5));
        let out = search.run().unwrap();
        assert_eq!(out.status, SearchStatus::Degraded);
        assert_eq!(solver.calls.get(), 6);
        assert_eq!(out.iterations, 6);
        let last = out.best.unwrap();
        assert_eq!(last.iteration, 5);
        assert!((last.program.tolerance - 5.0 * 0.0125).abs() < 1e-12);
    }

    #[test]
    fn zero_objective_optimum_is_degraded_and_tightest_kept() {
        let reg = registry();
        let p = portfolio();
        let solver = Scripted::new(SolveStatus::Optimal, 0.0);
        let search = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, config(3));
        let out = search.run().unwrap();
        assert_eq!(out.status, SearchStatus::Degraded);
        assert_eq!(out.tolerance(), Some(0.0));
        assert_eq!(out.best.unwrap().iteration, 0);
    }

    #[test]
    fn tolerance_schedule() {
        let reg = registry();
        let p = portfolio();
        let solver = Scripted::new(SolveStatus::Infeasible, 0.0);
        let cfg = SearchConfig {
            initial_tolerance: 0.1,
            tolerance_step: 0.05,
            max_iterations: 2,
        };
        let out = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, cfg)
            .run()
            .unwrap();
        let tolerances: Vec<f64> = out.history.iter().map(|a| a.tolerance).collect();
        assert_eq!(tolerances.len(), 3);
        assert!((tolerances[0] - 0.10).abs() < 1e-12);
        assert!((tolerances[1] - 0.15).abs() < 1e-12);
        assert!((tolerances[2] - 0.20).abs() < 1e-12);
    }

    #[test]
    fn cancellation_between_attempts() {
        let reg = registry();
        let p = portfolio();
        let solver = Scripted::new(SolveStatus::Infeasible, 0.0);
        let search = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, config(100));
        let out = search.run_until(|s| s.iteration < 3).unwrap();
        assert_eq!(out.status, SearchStatus::Cancelled);
        assert_eq!(solver.calls.get(), 3);
        assert!(out.best.is_some());

        let out = search.run_until(|_| false).unwrap();
        assert_eq!(out.status, SearchStatus::Cancelled);
        assert!(out.best.is_none());
        assert_eq!(out.iterations, 0);
    }

    #[test]
    fn build_error_aborts() {
        let reg = registry();
        let mut p = portfolio();
        p.set_allocation([("XYZ", 1.0)]).unwrap();
        let solver = Scripted::new(SolveStatus::Optimal, 1.0);
        let search = ToleranceSearch::new(ModelBuilder::new(&p, &reg), &solver, config(100));
        assert!(matches!(search.run(), Err(Error::UnknownTicker(_))));
        assert_eq!(solver.calls.get(), 0);
    }
}
