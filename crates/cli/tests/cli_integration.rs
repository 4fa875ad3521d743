//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `yinyang` binary and verify exit codes,
//! stdout content, and stderr content against the snapshot in
//! `tests/fixtures/lineage.json`.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("lineage.json")
}

/// Helper: create a Command for the `yinyang` binary with a clean log env.
fn yinyang() -> Command {
    let mut cmd = cargo_bin_cmd!("yinyang");
    cmd.env_remove("RUST_LOG")
        .env_remove("YINYANG_IMAGE_ORIGIN")
        .env_remove("YINYANG_FETCH_TIMEOUT_MS")
        .env_remove("YINYANG_MAX_CONCURRENT_FETCHES");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().expect("run yinyang");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    yinyang()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("yinyang admin reporting"));
}

#[test]
fn version_exits_0() {
    yinyang()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("yinyang"));
}

// ──────────────────────────────────────────────
// 2. chains
// ──────────────────────────────────────────────

#[test]
fn chains_text_lists_maximal_chains() {
    yinyang()
        .args(["chains", "--records"])
        .arg(fixture())
        .assert()
        .success()
        .stdout("F\nE\nD\nA -> B (good) -> C (bad)\n")
        .stderr(predicate::str::contains("4 chains, 1 issue"))
        .stderr(predicate::str::contains("names unknown parent deleted"));
}

#[test]
fn chains_raw_policy_keeps_prefix_chains() {
    yinyang()
        .args(["chains", "--policy", "raw", "--records"])
        .arg(fixture())
        .assert()
        .success()
        .stdout("F\nE\nD\nA -> B (good) -> C (bad)\nA -> B (good)\nA\n");
}

#[test]
fn chains_json_reports_view() {
    let value = stdout_json(
        yinyang()
            .args(["--output", "json", "chains", "--records"])
            .arg(fixture()),
    );
    assert_eq!(value["status"], "fresh");
    assert_eq!(value["from_cache"], false);
    assert_eq!(value["signal"]["value"], 6);
    let chains = value["chains"].as_array().unwrap();
    assert_eq!(chains.len(), 4);
    let longest = chains[3].as_array().unwrap();
    assert_eq!(longest[0]["request_id"], "A");
    assert_eq!(longest[0]["display"], "https://uploads.example/cat.png");
    assert_eq!(longest[2]["from_variant"], "bad");
    assert_eq!(value["issues"][0]["kind"], "dangling_parent");
}

#[test]
fn chains_config_file_sets_policy() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("yinyang.toml");
    fs::write(&config, "chain_policy = \"raw\"\n").unwrap();

    yinyang()
        .args(["chains", "--records"])
        .arg(fixture())
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::ends_with("A -> B (good)\nA\n"));
}

#[test]
fn chains_image_origin_override_unlinks_everything() {
    yinyang()
        .env("YINYANG_IMAGE_ORIGIN", "https://cdn.example")
        .args(["--quiet", "chains", "--records"])
        .arg(fixture())
        .assert()
        .success()
        .stdout("F\nE\nD\nC\nB\nA\n");
}

#[test]
fn chains_missing_snapshot_exits_1() {
    yinyang()
        .args(["chains", "--records", "/nonexistent/records.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn chains_invalid_snapshot_json_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    yinyang()
        .args(["--output", "json", "chains", "--records"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}

#[test]
fn chains_bad_config_exits_1() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("yinyang.toml");
    fs::write(&config, "max_concurrent_fetches = 0\n").unwrap();

    yinyang()
        .args(["chains", "--records"])
        .arg(fixture())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_concurrent_fetches"));
}

// ──────────────────────────────────────────────
// 3. inputs / variants
// ──────────────────────────────────────────────

#[test]
fn inputs_most_recent_first() {
    yinyang()
        .args(["inputs", "--records"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "https://images.yinyang.computerpho.be/deleted.good.png\n",
        ))
        .stdout(predicate::str::ends_with("https://uploads.example/cat.png\n"))
        .stderr(predicate::str::contains("5 distinct input images"));
}

#[test]
fn inputs_json_has_count() {
    let value = stdout_json(
        yinyang()
            .args(["--output", "json", "inputs", "--records"])
            .arg(fixture()),
    );
    assert_eq!(value["count"], 5);
    assert_eq!(value["input_urls"][4], "https://uploads.example/cat.png");
}

#[test]
fn variants_for_shared_input() {
    yinyang()
        .args(["variants", "--records"])
        .arg(fixture())
        .arg("https://uploads.example/cat.png")
        .assert()
        .success()
        .stdout(
            "F\tgood=https://images.yinyang.computerpho.be/F.good.png\tbad=https://images.yinyang.computerpho.be/F.bad.png\n\
             A\tgood=https://images.yinyang.computerpho.be/A.good.png\tbad=https://images.yinyang.computerpho.be/A.bad.png\n",
        );
}

#[test]
fn variants_json_for_unknown_input_is_empty() {
    let value = stdout_json(
        yinyang()
            .args(["--output", "json", "variants", "--records"])
            .arg(fixture())
            .arg("https://uploads.example/none.png"),
    );
    assert_eq!(value["variants"].as_array().unwrap().len(), 0);
}
