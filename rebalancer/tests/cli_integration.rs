//! Integration tests for the rebalancer CLI: commands, audit trail, and
//! exit codes.

use std::path::{Path, PathBuf};
use std::process::Command;

use rebalanced::SearchStatus;
use rebalanced_cli::commands::{self, RunOptions};
use rebalanced_cli::config::Config;
use rebalanced_cli::error::Error;
use rust_decimal_macros::dec;

fn snapshot_json() -> &'static str {
    r#"{
        "name": "household",
        "assets": [
            { "ticker": "VTI", "value": "100" },
            { "ticker": "GBTC", "value": "40" },
            { "ticker": "bitcoin", "value": "40000" }
        ],
        "accounts": [
            {
                "name": "INV",
                "type": "taxable",
                "fractional": false,
                "permissible": ["VTI", "CASH"],
                "priority": ["VTI"],
                "holdings": { "VTI": "5.5", "CASH": "1000" }
            },
            {
                "name": "Roth",
                "type": "roth",
                "fractional": false,
                "permissible": ["GBTC", "CASH"],
                "holdings": { "CASH": "400" }
            }
        ],
        "allocations": { "VTI": 0.75, "bitcoin": 0.25 }
    }"#
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn config_with_audit(dir: &Path) -> Config {
    let toml = format!(
        "[logging]\ndir = {:?}\naudit_file = \"audit.jsonl\"\n",
        dir.join("logs").display().to_string()
    );
    Config::from_toml(&toml).unwrap()
}

// ============================================================================
// run
// ============================================================================

#[test]
fn run_solves_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = config_with_audit(dir.path());

    let r = commands::run(&config, &snapshot, &RunOptions::default()).unwrap();
    assert_eq!(r.status, SearchStatus::Optimal);
    // whole-share value 1500 + 400; the half VTI share rides along
    let vti = r.positions.get("VTI", "INV").unwrap();
    assert!(vti >= dec!(14) && vti <= dec!(15.5), "VTI {vti}");
    assert!(r.positions.get("GBTC", "Roth").unwrap() > dec!(0));
}

#[test]
fn run_positions_survive_json() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = Config::from_toml("[logging]\naudit = false\n").unwrap();

    let r = commands::run(&config, &snapshot, &RunOptions::default()).unwrap();
    let json = serde_json::to_string(&r.positions).unwrap();
    let back: rebalanced::RebalanceResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, r.positions);
}

#[test]
fn run_writes_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = config_with_audit(dir.path());
    commands::run(&config, &snapshot, &RunOptions::default()).unwrap();

    let audit = config.audit_path().unwrap();
    let contents = std::fs::read_to_string(audit).unwrap();
    let events: Vec<String> = contents
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        ["run_started", "search_finished", "positions_computed"]
    );
}

#[test]
fn run_wire_rejects_underscore_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let json = snapshot_json().replace("\"Roth\"", "\"Roth_IRA\"");
    let snapshot = write(dir.path(), "snapshot.json", &json);
    let config = Config::from_toml("[logging]\naudit = false\n").unwrap();

    let err = commands::run(&config, &snapshot, &RunOptions { wire: true }).unwrap_err();
    assert!(matches!(
        err,
        Error::Rebalance(rebalanced::Error::AmbiguousKey { .. })
    ));
}

#[test]
fn run_missing_snapshot() {
    let config = Config::default();
    let err = commands::run(&config, Path::new("/nonexistent/snapshot.json"), &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::SnapshotRead { .. }));
}

#[test]
fn run_reject_policy_fails_on_unsatisfiable() {
    let dir = tempfile::tempdir().unwrap();
    let json = snapshot_json().replace(
        "\"allocations\": { \"VTI\": 0.75, \"bitcoin\": 0.25 }",
        "\"allocations\": { \"VTI\": 0.75, \"VNQ\": 0.25 }",
    );
    let snapshot = write(dir.path(), "snapshot.json", &json);
    let config =
        Config::from_toml("[objective]\nunsatisfiable = \"reject\"\n[logging]\naudit = false\n")
            .unwrap();
    let err = commands::run(&config, &snapshot, &RunOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Rebalance(rebalanced::Error::UnsatisfiableAllocation(_))
    ));
}

// ============================================================================
// check / assets
// ============================================================================

#[test]
fn check_builds_program() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let program = commands::check(&Config::default(), &snapshot).unwrap();
    assert_eq!(program.variables.len(), 4);
    assert_eq!(program.integer_count(), 2);
    assert!(program.unsatisfiable.is_empty());
}

#[test]
fn check_reports_unknown_ticker() {
    let dir = tempfile::tempdir().unwrap();
    let json = snapshot_json().replace("\"bitcoin\": 0.25", "\"NOPE\": 0.25");
    let snapshot = write(dir.path(), "snapshot.json", &json);
    let err = commands::check(&Config::default(), &snapshot).unwrap_err();
    assert!(matches!(
        err,
        Error::Rebalance(rebalanced::Error::UnknownTicker(_))
    ));
}

#[test]
fn assets_overlay_snapshot_prices() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let registry = commands::assets(Some(&snapshot)).unwrap();
    assert_eq!(registry.get("VTI").unwrap().value(), dec!(100));
    let seeded = commands::assets(None).unwrap();
    assert_eq!(seeded.len(), registry.len());
}

// ============================================================================
// Binary exit codes
// ============================================================================

fn rebalancer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rebalancer"));
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn binary_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = write(dir.path(), "config.toml", "[logging]\naudit = false\n");
    let out = rebalancer()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&snapshot)
        .arg("--strict")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("REBALANCE PLAN"));
    assert!(stdout.contains("ALLOCATION COMPLIANCE"));
}

#[test]
fn binary_wire_output_is_json() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = write(dir.path(), "config.toml", "[logging]\naudit = false\n");
    let out = rebalancer()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&snapshot)
        .arg("--wire")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&out.stdout).unwrap();
    assert!(map.contains_key("VTI_INV"));
    assert!(map.contains_key("GBTC_Roth"));
}

#[test]
fn binary_strict_degraded_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    // no priority or undesired tickers anywhere: the objective is empty
    let json = r#"{
        "name": "flat",
        "accounts": [ {
            "name": "A", "type": "taxable", "fractional": true,
            "permissible": ["CASH"], "priority": [], "undesired": [],
            "holdings": { "CASH": "100" }
        } ]
    }"#;
    let snapshot = write(dir.path(), "snapshot.json", json);
    let config = write(
        dir.path(),
        "config.toml",
        "[search]\nmax_iterations = 2\n[logging]\naudit = false\n",
    );
    let out = rebalancer()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&snapshot)
        .arg("--strict")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn binary_bad_config_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write(dir.path(), "snapshot.json", snapshot_json());
    let config = write(dir.path(), "config.toml", "[search]\ntolerance_step = -1.0\n");
    let out = rebalancer()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}
