//! End-to-end tests for `ragstack plan` — the one command that exercises
//! the full declaration and ordering logic offline.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ragstack() -> Command {
    Command::cargo_bin("ragstack").expect("ragstack binary should exist")
}

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("ragstack.yaml");
    std::fs::write(&path, content).expect("write config");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_plan_lists_resources_in_dependency_order() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(&dir, "project: support-kb\nregion: us-east-1\n");

    let output = ragstack()
        .args(["plan", "--config", &config])
        .output()
        .expect("run plan");
    assert!(output.status.success(), "plan failed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let position = |needle: &str| {
        stdout
            .find(needle)
            .unwrap_or_else(|| panic!("{needle} missing from plan output:\n{stdout}"))
    };
    assert!(position("search-domain") < position("index-initializer"));
    assert!(position("index-initializer") < position("knowledge-base "));
    assert!(position("knowledge-base ") < position("data-source"));
}

#[test]
fn test_plan_json_emits_six_entries_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(&dir, "project: support-kb\nregion: eu-west-1\n");

    let output = ragstack()
        .args(["plan", "--config", &config, "--json"])
        .output()
        .expect("run plan");
    assert!(output.status.success(), "plan failed: {output:?}");

    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(&output.stdout).expect("plan --json must emit valid JSON");
    let ids: Vec<&str> = entries
        .iter()
        .map(|e| e["id"].as_str().expect("id"))
        .collect();
    assert_eq!(
        ids,
        [
            "document-bucket",
            "knowledge-base-role",
            "search-domain",
            "index-initializer",
            "knowledge-base",
            "data-source",
        ]
    );
    assert_eq!(entries[3]["kind"], "index-initializer");
}

#[test]
fn test_plan_rejects_invalid_project_name() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(&dir, "project: Not_Valid\nregion: us-east-1\n");

    ragstack()
        .args(["plan", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid project name"));
}

#[test]
fn test_plan_rejects_invalid_index_name() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(
        &dir,
        "project: support-kb\nregion: us-east-1\nindex:\n  name: \"has space\"\n",
    );

    ragstack()
        .args(["plan", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid index name"));
}

#[test]
fn test_plan_quiet_suppresses_listing_but_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(&dir, "project: support-kb\nregion: us-east-1\n");

    let output = ragstack()
        .args(["plan", "--config", &config, "--quiet"])
        .output()
        .expect("run plan");
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "quiet plan must print nothing");
}
