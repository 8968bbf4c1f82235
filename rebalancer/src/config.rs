//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use rebalanced::{ObjectiveWeights, RebalanceConfig, SearchConfig, SolverConfig, UnsatisfiablePolicy};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub objective: ObjectiveSection,
    #[serde(default)]
    pub solver: SolverSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_initial_tolerance")]
    pub initial_tolerance: f64,
    #[serde(default = "default_tolerance_step")]
    pub tolerance_step: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_initial_tolerance() -> f64 {
    0.0
}
fn default_tolerance_step() -> f64 {
    0.0125
}
fn default_max_iterations() -> u32 {
    100
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            initial_tolerance: default_initial_tolerance(),
            tolerance_step: default_tolerance_step(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveSection {
    #[serde(default = "default_asset_weight")]
    pub asset_weight: f64,
    #[serde(default = "default_cash_weight")]
    pub cash_weight: f64,
    /// `"skip"` or `"reject"`.
    #[serde(default)]
    pub unsatisfiable: UnsatisfiablePolicy,
}

fn default_asset_weight() -> f64 {
    1.0
}
fn default_cash_weight() -> f64 {
    0.5
}

impl Default for ObjectiveSection {
    fn default() -> Self {
        Self {
            asset_weight: default_asset_weight(),
            cash_weight: default_cash_weight(),
            unsatisfiable: UnsatisfiablePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverSection {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_integrality_tolerance")]
    pub integrality_tolerance: f64,
}

fn default_max_nodes() -> usize {
    10_000
}
fn default_integrality_tolerance() -> f64 {
    1e-6
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            integrality_tolerance: default_integrality_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
    /// Set to false to skip the audit trail entirely.
    #[serde(default = "default_true")]
    pub audit: bool,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}
fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
            audit: default_true(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    ///
    /// CLI-level checks first; numeric ranges are then checked by the core
    /// [`RebalanceConfig::validate`].
    fn validate(&self) -> Result<()> {
        if self.logging.audit && self.logging.audit_file.is_empty() {
            return Err(Error::Config("audit_file must not be empty".into()));
        }
        self.rebalance()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Optimizer settings for the core library.
    pub fn rebalance(&self) -> RebalanceConfig {
        RebalanceConfig {
            search: SearchConfig {
                initial_tolerance: self.search.initial_tolerance,
                tolerance_step: self.search.tolerance_step,
                max_iterations: self.search.max_iterations,
            },
            objective: ObjectiveWeights {
                asset_weight: self.objective.asset_weight,
                cash_weight: self.objective.cash_weight,
            },
            unsatisfiable: self.objective.unsatisfiable,
            solver: SolverConfig {
                max_nodes: self.solver.max_nodes,
                integrality_tolerance: self.solver.integrality_tolerance,
            },
        }
    }

    /// Full path to the audit log file, if auditing is enabled.
    pub fn audit_path(&self) -> Option<PathBuf> {
        self.logging
            .audit
            .then(|| Path::new(&self.logging.dir).join(&self.logging.audit_file))
    }
}
