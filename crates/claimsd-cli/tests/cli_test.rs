//! Integration tests for the `claimsd` CLI binary.
//!
//! These tests validate argument parsing, help output, and error handling
//! — all without requiring a live claims service.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `claimsd` binary with env isolation.
fn claimsd_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("claimsd");
    cmd.env_remove("CLAIMSD_ENDPOINT").env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = claimsd_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_subcommands() {
    claimsd_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("dump").and(predicate::str::contains("errors")),
    );
}

#[test]
fn test_dump_help_lists_flags() {
    claimsd_cmd()
        .args(["dump", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--watch")
                .and(predicate::str::contains("--claims-only"))
                .and(predicate::str::contains("--products-only"))
                .and(predicate::str::contains("--product"))
                .and(predicate::str::contains("--timeout")),
        );
}

// ── Errors table ────────────────────────────────────────────────────

#[test]
fn test_errors_prints_status_table() {
    claimsd_cmd().arg("errors").assert().success().stdout(
        predicate::str::contains("0x101")
            .and(predicate::str::contains("Not Initialized"))
            .and(predicate::str::contains(
                "Ensure failed, product claim value mismatch",
            )),
    );
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_dump_conflicting_narrowing_flags() {
    let output = claimsd_cmd()
        .args(["dump", "--claims-only", "--products-only"])
        .output()
        .unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for conflicting flags"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("cannot be used with"),
        "Expected conflict error:\n{text}"
    );
}

#[test]
fn test_dump_invalid_endpoint() {
    claimsd_cmd()
        .args(["--endpoint", "not a url", "dump"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid endpoint"));
}

#[test]
fn test_dump_unreachable_endpoint_times_out() {
    // Nothing listens on the discard port; the one-shot wait expires.
    let output = claimsd_cmd()
        .args(["--endpoint", "http://127.0.0.1:9", "dump", "--timeout", "1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(8), "Expected timeout exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("Timed out"),
        "Expected timeout diagnostic:\n{text}"
    );
}
