//! Plain-text plan and compliance tables.

use std::fmt::Write;

use rebalanced::{AllocationCompliance, Portfolio, Rebalance};
use rust_decimal::Decimal;

/// Per-position plan: current, target, and the trade between them.
///
/// Unchanged positions are listed too, so the table covers every
/// variable the optimizer saw.
pub fn plan_table(rebalance: &Rebalance, portfolio: &Portfolio) -> String {
    let changes = rebalance.changes(portfolio);
    let mut out = String::new();
    if changes.is_empty() {
        out.push_str("No positions.\n");
        return out;
    }

    out.push_str("REBALANCE PLAN:\n");
    let _ = writeln!(
        out,
        "  {:10} {:16} {:>16} {:>16} {:>16}",
        "Ticker", "Account", "Current", "Target", "Delta"
    );
    for c in &changes {
        let action = if c.delta > Decimal::ZERO {
            "BUY"
        } else if c.delta < Decimal::ZERO {
            "SELL"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {:10} {:16} {:>16} {:>16} {:>16}  {}",
            c.key.ticker.as_str(),
            c.key.account,
            c.current.normalize(),
            c.target.normalize(),
            c.delta.normalize(),
            action,
        );
    }
    out
}

/// Target versus realized share per allocated ticker.
pub fn compliance_table(report: &[AllocationCompliance], tolerance: f64) -> String {
    let mut out = String::from("\nALLOCATION COMPLIANCE:\n");
    let _ = writeln!(
        out,
        "  {:10} {:>9} {:>9} {:>10}",
        "Ticker", "Target", "Actual", "Deviation"
    );
    for c in report {
        let flag = if c.within(tolerance + 1e-9) { "" } else { "  OUT OF BAND" };
        let _ = writeln!(
            out,
            "  {:10} {:>8.2}% {:>8.2}% {:>+9.2}%{}",
            c.ticker.as_str(),
            c.target_pct * 100.0,
            c.realized_pct * 100.0,
            c.deviation * 100.0,
            flag,
        );
    }
    out
}

/// One-line outcome summary.
pub fn summary(rebalance: &Rebalance) -> String {
    let mut out = format!(
        "\nStatus: {} after {} attempt(s), tolerance {:.2}%, objective {:.4}",
        rebalance.status,
        rebalance.iterations,
        rebalance.tolerance * 100.0,
        rebalance.objective,
    );
    if let Some(solve) = rebalance.solve_status {
        let _ = write!(out, " (solver: {solve})");
    }
    for t in &rebalance.unsatisfiable {
        let _ = write!(out, "\nUnsatisfiable: no account can hold {t}");
    }
    for t in &rebalance.unenforced {
        let _ = write!(out, "\nUnenforced: no position counts toward {t}");
    }
    out
}
