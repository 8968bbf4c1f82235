//! Subcommand implementations. Each prints to stdout and returns what it
//! computed so callers (and tests) can inspect it.

use std::path::Path;

use log::{info, warn};
use rebalanced::valuation::portfolio_value;
use rebalanced::{AssetRegistry, LinearProgram, ModelBuilder, Rebalance, Rebalancer};

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::report;
use crate::snapshot::Snapshot;

/// Options for `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print the underscore-keyed position map instead of the tables.
    pub wire: bool,
}

/// Solve the snapshot and print the plan.
pub fn run(config: &Config, snapshot_path: &Path, opts: &RunOptions) -> Result<Rebalance> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let registry = snapshot.registry()?;
    let portfolio = snapshot.portfolio()?;

    let mut audit = config.audit_path().map(|p| AuditLog::open(&p)).transpose()?;
    if let Some(log) = audit.as_mut() {
        log.run_started(&snapshot_path.display().to_string(), &portfolio)?;
    }

    let rebalancer = Rebalancer::new(&registry, config.rebalance())?;
    let rebalance = rebalancer.rebalance(&portfolio)?;

    if let Some(log) = audit.as_mut() {
        log.search_finished(&rebalance)?;
        log.positions_computed(&rebalance, &portfolio)?;
    }

    if opts.wire {
        let wire = rebalance.positions.to_wire()?;
        let json = serde_json::to_string_pretty(&wire).map_err(Error::Encode)?;
        println!("{json}");
    } else {
        println!(
            "Portfolio {}: {} accounts, value {}",
            portfolio.name(),
            portfolio.account_count(),
            rebalance.portfolio_value.normalize()
        );
        print!("{}", report::plan_table(&rebalance, &portfolio));
        if !rebalance.positions.is_empty() {
            let compliance = rebalance.compliance(&portfolio, &registry)?;
            print!("{}", report::compliance_table(&compliance, rebalance.tolerance));
        }
        println!("{}", report::summary(&rebalance));
    }
    Ok(rebalance)
}

/// Validate a snapshot and build its first program without solving.
pub fn check(config: &Config, snapshot_path: &Path) -> Result<LinearProgram> {
    let snapshot = Snapshot::load(snapshot_path)?;
    let registry = snapshot.registry()?;
    let portfolio = snapshot.portfolio()?;
    let settings = config.rebalance();

    let program = ModelBuilder::new(&portfolio, &registry)
        .weights(settings.objective)
        .unsatisfiable_policy(settings.unsatisfiable)
        .build(settings.search.initial_tolerance)?;

    info!("snapshot {} is valid", snapshot_path.display());
    println!(
        "Portfolio {}: {} accounts, value {}",
        portfolio.name(),
        portfolio.account_count(),
        portfolio_value(&portfolio, &registry)?.normalize()
    );
    println!(
        "  {} variables ({} integer), {} constraints, {} objective terms",
        program.variables.len(),
        program.integer_count(),
        program.constraints.len(),
        program.objective.len()
    );
    for w in &program.warnings {
        warn!("{w}");
        println!("  warning: {w}");
    }
    for t in &program.unsatisfiable {
        println!("  unsatisfiable: no account can hold {t}");
    }
    for t in &program.unenforced {
        println!("  unenforced: no position counts toward {t}");
    }
    Ok(program)
}

/// List the asset registry, with the snapshot's overrides if given.
pub fn assets(snapshot_path: Option<&Path>) -> Result<AssetRegistry> {
    let registry = match snapshot_path {
        Some(path) => Snapshot::load(path)?.registry()?,
        None => AssetRegistry::seeded(),
    };
    println!(
        "  {:10} {:10} {:>12} {:>10} {:10}",
        "Ticker", "Class", "Value", "Fractional", "Equivalent"
    );
    for asset in registry.iter() {
        println!(
            "  {:10} {:10} {:>12} {:>10} {:10}",
            asset.ticker().as_str(),
            asset.class().to_string(),
            asset.value().normalize(),
            if asset.fractional() { "yes" } else { "no" },
            asset.equivalent().map_or("-", |t| t.as_str()),
        );
    }
    Ok(registry)
}
