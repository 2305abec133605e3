//! CLI integration tests for the `shelter` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shelter() -> Command {
    let mut cmd = cargo_bin_cmd!("shelter");
    cmd.env_remove("RUST_LOG");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    shelter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Animal shelter adoption service"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("conformance"));
}

#[test]
fn version_exits_0() {
    shelter()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shelter"));
}

#[test]
fn unknown_subcommand_fails() {
    shelter().arg("adopt").assert().failure();
}

// ──────────────────────────────────────────────
// 2. Conformance
// ──────────────────────────────────────────────

#[test]
fn conformance_passes_for_memory_backend() {
    shelter()
        .arg("conformance")
        .assert()
        .success()
        .stdout(predicate::str::contains("Conformance:"))
        .stdout(predicate::str::contains("(0 failed)"));
}

#[test]
fn conformance_json_output() {
    let output = shelter()
        .args(["--output", "json", "conformance"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["failed"], 0);
    assert!(report["total"].as_u64().unwrap() > 0);
    assert_eq!(
        report["passed"].as_u64(),
        report["results"].as_array().map(|r| r.len() as u64)
    );
}

#[test]
fn invalid_output_format_is_rejected() {
    shelter()
        .args(["--output", "yaml", "conformance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ──────────────────────────────────────────────
// 3. Serve startup failures
// ──────────────────────────────────────────────

#[test]
fn serve_with_missing_config_fails() {
    shelter()
        .args(["serve", "--config", "/nonexistent/shelter.toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn serve_with_malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shelter.toml");
    std::fs::write(&path, "port = \"eighty\"\n").unwrap();

    shelter()
        .args(["serve", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn serve_with_bad_env_policy_fails() {
    shelter()
        .arg("serve")
        .env("SHELTER_TRANSITION_POLICY", "lax")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SHELTER_TRANSITION_POLICY"));
}

#[test]
fn serve_with_malformed_seed_file_fails() {
    let dir = TempDir::new().unwrap();
    let seed = dir.path().join("animals.json");
    std::fs::write(&seed, "{ not json").unwrap();
    let config = dir.path().join("shelter.toml");
    std::fs::write(
        &config,
        format!("seed_animals = {:?}\n", seed.display().to_string()),
    )
    .unwrap();

    shelter()
        .args(["serve", "--port", "0", "--config"])
        .arg(&config)
        .env_remove("SHELTER_TRANSITION_POLICY")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid seed file"));
}
