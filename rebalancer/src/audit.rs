//! JSONL audit trail.
//!
//! Each run appends its events to an audit.jsonl file, one JSON object
//! per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use rebalanced::search::Attempt;
use rebalanced::{Portfolio, Rebalance, SearchStatus, SolveStatus, Ticker};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

/// One audit event. The variant name becomes the `event` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent<'a> {
    RunStarted {
        snapshot: &'a str,
        portfolio: &'a str,
        accounts: usize,
        allocations: usize,
    },
    SearchFinished {
        status: SearchStatus,
        solve_status: Option<SolveStatus>,
        iterations: u32,
        tolerance: f64,
        objective: f64,
        unsatisfiable: &'a [Ticker],
        unenforced: &'a [Ticker],
        attempts: &'a [Attempt],
    },
    PositionsComputed {
        portfolio_value: Decimal,
        positions: Vec<PositionRecord<'a>>,
    },
}

/// Current and target quantity of one position.
#[derive(Debug, Clone, Serialize)]
pub struct PositionRecord<'a> {
    pub ticker: &'a str,
    pub account: &'a str,
    pub current: Decimal,
    pub target: Decimal,
    pub delta: Decimal,
}

#[derive(Serialize)]
struct Entry<'e, 'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    event: &'e AuditEvent<'a>,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one event, stamped with the current time.
    pub fn record(&mut self, event: &AuditEvent<'_>) -> Result<()> {
        let entry = Entry {
            ts: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn run_started(&mut self, snapshot: &str, portfolio: &Portfolio) -> Result<()> {
        self.record(&AuditEvent::RunStarted {
            snapshot,
            portfolio: portfolio.name(),
            accounts: portfolio.account_count(),
            allocations: portfolio.allocations().count(),
        })
    }

    pub fn search_finished(&mut self, rebalance: &Rebalance) -> Result<()> {
        self.record(&AuditEvent::SearchFinished {
            status: rebalance.status,
            solve_status: rebalance.solve_status,
            iterations: rebalance.iterations,
            tolerance: rebalance.tolerance,
            objective: rebalance.objective,
            unsatisfiable: &rebalance.unsatisfiable,
            unenforced: &rebalance.unenforced,
            attempts: &rebalance.history,
        })
    }

    pub fn positions_computed(&mut self, rebalance: &Rebalance, portfolio: &Portfolio) -> Result<()> {
        let changes = rebalance.changes(portfolio);
        let positions = changes
            .iter()
            .map(|c| PositionRecord {
                ticker: c.key.ticker.as_str(),
                account: &c.key.account,
                current: c.current,
                target: c.target,
                delta: c.delta,
            })
            .collect();
        self.record(&AuditEvent::PositionsComputed {
            portfolio_value: rebalance.portfolio_value,
            positions,
        })
    }
}
