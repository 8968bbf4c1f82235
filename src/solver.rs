//! LP/MIP solving.
//!
//! [`MicroLpSolver`] solves continuous relaxations with the `microlp`
//! simplex and enforces integrality with a node-limited depth-first
//! branch-and-bound.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};
use microlp::{ComparisonOp, OptimizationDirection, Problem, Solution};

use crate::config::SolverConfig;
use crate::model::{LinearProgram, Relation, VarId};

/// Termination status of one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Integral and feasible, optimality not proven.
    Feasible,
    Infeasible,
    Unbounded,
    /// Node budget exhausted before any integral point was found.
    NodeLimit,
    /// The engine failed internally.
    Abnormal,
}

impl SolveStatus {
    /// Whether the outcome carries usable values.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::NodeLimit => "node limit",
            SolveStatus::Abnormal => "abnormal",
        };
        f.write_str(s)
    }
}

/// Status, objective, and one value per program variable.
///
/// `values` is empty unless the status has a solution.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: f64,
    pub values: Vec<f64>,
}

impl SolveOutcome {
    fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            objective: 0.0,
            values: Vec::new(),
        }
    }
}

/// An LP/MIP engine. Maximises the program's objective.
pub trait Solver {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome;
}

impl<S: Solver + ?Sized> Solver for &S {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome {
        (**self).solve(program)
    }
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome {
        (**self).solve(program)
    }
}

/// Pure-Rust solver backed by `microlp`.
#[derive(Clone, Debug, Default)]
pub struct MicroLpSolver {
    config: SolverConfig,
}

impl MicroLpSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Depth-first search over relaxations, starting at the root.
    fn branch_and_bound(
        &self,
        program: &LinearProgram,
        vars: &[microlp::Variable],
        root: Solution,
    ) -> SolveOutcome {
        let tol = self.config.integrality_tolerance;
        let mut stack = vec![root];
        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut nodes = 0usize;

        while let Some(node) = stack.pop() {
            nodes += 1;
            if nodes > self.config.max_nodes {
                debug!("branch-and-bound: node limit {} reached", self.config.max_nodes);
                return match best {
                    Some((objective, values)) => SolveOutcome {
                        status: SolveStatus::Feasible,
                        objective,
                        values,
                    },
                    None => SolveOutcome::without_solution(SolveStatus::NodeLimit),
                };
            }

            if let Some((incumbent, _)) = &best {
                if node.objective() <= incumbent + prune_margin(*incumbent) {
                    continue;
                }
            }

            let values: Vec<f64> = vars.iter().map(|&v| *node.var_value(v)).collect();
            let Some((var, x)) = most_fractional(program, &values, tol) else {
                let values = round_integers(program, values);
                let objective = program.objective_value(&values);
                if best.as_ref().is_none_or(|(b, _)| objective > *b) {
                    best = Some((objective, values));
                }
                continue;
            };

            let floor = x.floor();
            let down = node
                .clone()
                .add_constraint([(vars[var], 1.0)], ComparisonOp::Le, floor);
            let up = node.add_constraint([(vars[var], 1.0)], ComparisonOp::Ge, floor + 1.0);
            // Stack order: the nearer rounding is popped first.
            let children = if x - floor >= 0.5 { [down, up] } else { [up, down] };
            for child in children {
                match child {
                    Ok(solution) => stack.push(solution),
                    Err(microlp::Error::InternalError(msg)) => {
                        debug!("branch-and-bound: pruned node after engine error: {msg}");
                    }
                    Err(_) => {}
                }
            }
        }

        debug!("branch-and-bound: {nodes} nodes explored");
        match best {
            Some((objective, values)) => SolveOutcome {
                status: SolveStatus::Optimal,
                objective,
                values,
            },
            None => SolveOutcome::without_solution(SolveStatus::Infeasible),
        }
    }
}

impl Solver for MicroLpSolver {
    fn solve(&self, program: &LinearProgram) -> SolveOutcome {
        let mut objective = vec![0.0; program.variables.len()];
        for &(var, coeff) in &program.objective {
            objective[var] += coeff;
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let vars: Vec<microlp::Variable> = program
            .variables
            .iter()
            .zip(&objective)
            .map(|(v, &c)| problem.add_var(c, (v.lower, v.upper)))
            .collect();

        for constraint in &program.constraints {
            let terms = merge_terms(&constraint.terms);
            if terms.is_empty() {
                // 0 (relation) rhs
                let rhs = constraint.rhs;
                let margin = 1e-9 * rhs.abs().max(1.0);
                let holds = match constraint.relation {
                    Relation::Eq => rhs.abs() <= margin,
                    Relation::Le => rhs >= -margin,
                    Relation::Ge => rhs <= margin,
                };
                if !holds {
                    return SolveOutcome::without_solution(SolveStatus::Infeasible);
                }
                continue;
            }
            problem.add_constraint(
                terms
                    .iter()
                    .map(|(&v, &c)| (vars[v], c))
                    .collect::<Vec<_>>(),
                comparison(constraint.relation),
                constraint.rhs,
            );
        }

        if vars.is_empty() {
            return SolveOutcome {
                status: SolveStatus::Optimal,
                objective: 0.0,
                values: Vec::new(),
            };
        }

        let root = match problem.solve() {
            Ok(solution) => solution,
            Err(microlp::Error::Infeasible) => {
                return SolveOutcome::without_solution(SolveStatus::Infeasible);
            }
            Err(microlp::Error::Unbounded) => {
                return SolveOutcome::without_solution(SolveStatus::Unbounded);
            }
            Err(microlp::Error::InternalError(msg)) => {
                warn!("LP engine failure: {msg}");
                return SolveOutcome::without_solution(SolveStatus::Abnormal);
            }
        };

        if program.integer_count() == 0 {
            let values: Vec<f64> = vars.iter().map(|&v| *root.var_value(v)).collect();
            return SolveOutcome {
                status: SolveStatus::Optimal,
                objective: root.objective(),
                values,
            };
        }
        self.branch_and_bound(program, &vars, root)
    }
}

fn comparison(relation: Relation) -> ComparisonOp {
    match relation {
        Relation::Eq => ComparisonOp::Eq,
        Relation::Le => ComparisonOp::Le,
        Relation::Ge => ComparisonOp::Ge,
    }
}

/// Sum coefficients per variable and drop zeros. The engine rejects a
/// variable that appears twice in one expression.
fn merge_terms(terms: &[(VarId, f64)]) -> BTreeMap<VarId, f64> {
    let mut merged = BTreeMap::new();
    for &(var, coeff) in terms {
        *merged.entry(var).or_insert(0.0) += coeff;
    }
    merged.retain(|_, c| *c != 0.0);
    merged
}

/// Integer variable furthest from integrality, with its value.
fn most_fractional(program: &LinearProgram, values: &[f64], tol: f64) -> Option<(VarId, f64)> {
    program
        .variables
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(_, (var, _))| var.is_integer())
        .map(|(i, (_, &x))| (i, x, (x - x.round()).abs()))
        .filter(|&(_, _, frac)| frac > tol)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(i, x, _)| (i, x))
}

fn round_integers(program: &LinearProgram, mut values: Vec<f64>) -> Vec<f64> {
    for (var, x) in program.variables.iter().zip(values.iter_mut()) {
        if var.is_integer() {
            *x = x.round();
        }
    }
    values
}

fn prune_margin(incumbent: f64) -> f64 {
    1e-9 * incumbent.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constraint, ConstraintKind, Domain, Variable};
    use crate::result::PositionKey;
    use crate::types::{AccountId, Ticker};
    use rust_decimal::Decimal;

    fn var(program: &mut LinearProgram, name: &str, domain: Domain, upper: f64) -> VarId {
        program.add_variable(Variable {
            key: PositionKey::new(name, "A"),
            account: AccountId(1),
            domain,
            lower: 0.0,
            upper,
            price: 1.0,
        })
    }

    fn constraint(terms: Vec<(VarId, f64)>, relation: Relation, rhs: f64) -> Constraint {
        Constraint {
            kind: ConstraintKind::TargetFloor(Ticker::new("T")),
            terms,
            relation,
            rhs,
        }
    }

    #[test]
    fn continuous_lp() {
        // max x + y  s.t. x + 2y <= 4, 3x + y <= 6
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Continuous, 10.0);
        let y = var(&mut lp, "Y", Domain::Continuous, 10.0);
        lp.objective = vec![(x, 1.0), (y, 1.0)];
        lp.constraints.push(constraint(vec![(x, 1.0), (y, 2.0)], Relation::Le, 4.0));
        lp.constraints.push(constraint(vec![(x, 3.0), (y, 1.0)], Relation::Le, 6.0));

        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert!((out.objective - 2.8).abs() < 1e-6);
        assert!((out.values[x] - 1.6).abs() < 1e-6);
        assert!((out.values[y] - 1.2).abs() < 1e-6);
    }

    #[test]
    fn integer_program() {
        // Same polytope, integral: optimum 2 at (2, 0), (1, 1), or (0, 2).
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Integer, 10.0);
        let y = var(&mut lp, "Y", Domain::Integer, 10.0);
        lp.objective = vec![(x, 1.0), (y, 1.0)];
        lp.constraints.push(constraint(vec![(x, 1.0), (y, 2.0)], Relation::Le, 4.0));
        lp.constraints.push(constraint(vec![(x, 3.0), (y, 1.0)], Relation::Le, 6.0));

        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert!((out.objective - 2.0).abs() < 1e-9);
        assert!(lp.is_feasible(&out.values, 1e-6));
        assert_eq!(out.values[x].fract(), 0.0);
        assert_eq!(out.values[y].fract(), 0.0);
    }

    #[test]
    fn mixed_equality() {
        // 7x + c = 100, x integer, max x
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Integer, 100.0);
        let c = var(&mut lp, "CASH", Domain::Continuous, 100.0);
        lp.objective = vec![(x, 1.0)];
        lp.constraints.push(constraint(vec![(x, 7.0), (c, 1.0)], Relation::Eq, 100.0));

        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.values[x], 14.0);
        assert!((out.values[c] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible() {
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Continuous, 10.0);
        lp.constraints.push(constraint(vec![(x, 1.0)], Relation::Ge, 20.0));
        assert_eq!(MicroLpSolver::default().solve(&lp).status, SolveStatus::Infeasible);
    }

    #[test]
    fn integer_infeasible() {
        // 2x = 3 has no integral solution
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Integer, 10.0);
        lp.constraints.push(constraint(vec![(x, 2.0)], Relation::Eq, 3.0));
        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert!(out.values.is_empty());
    }

    #[test]
    fn unbounded() {
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Continuous, f64::INFINITY);
        lp.objective = vec![(x, 1.0)];
        assert_eq!(MicroLpSolver::default().solve(&lp).status, SolveStatus::Unbounded);
    }

    #[test]
    fn empty_constraint_checked_directly() {
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        var(&mut lp, "X", Domain::Continuous, 10.0);
        lp.constraints.push(constraint(vec![], Relation::Ge, 0.0));
        assert_eq!(MicroLpSolver::default().solve(&lp).status, SolveStatus::Optimal);
        lp.constraints.push(constraint(vec![], Relation::Ge, 5.0));
        assert_eq!(MicroLpSolver::default().solve(&lp).status, SolveStatus::Infeasible);
    }

    #[test]
    fn duplicate_terms_merged() {
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Continuous, 10.0);
        lp.objective = vec![(x, 0.5), (x, 0.5)];
        lp.constraints.push(constraint(vec![(x, 1.0), (x, 1.0)], Relation::Le, 8.0));
        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert!((out.values[x] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn node_limit() {
        // Needs branching; one node is only the root relaxation.
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Integer, 10.0);
        lp.objective = vec![(x, 1.0)];
        lp.constraints.push(constraint(vec![(x, 2.0)], Relation::Le, 7.0));
        let solver = MicroLpSolver::new(SolverConfig {
            max_nodes: 1,
            ..SolverConfig::default()
        });
        assert_eq!(solver.solve(&lp).status, SolveStatus::NodeLimit);
        let out = MicroLpSolver::default().solve(&lp);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.values[x], 3.0);
    }

    #[test]
    fn solver_by_reference_and_box() {
        let mut lp = LinearProgram::new(0.0, Decimal::ZERO);
        let x = var(&mut lp, "X", Domain::Continuous, 3.0);
        lp.objective = vec![(x, 1.0)];
        let solver = MicroLpSolver::default();
        let boxed: Box<dyn Solver> = Box::new(solver.clone());
        assert_eq!((&solver).solve(&lp).status, boxed.solve(&lp).status);
    }
}
