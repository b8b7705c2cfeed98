//! End-to-end tests of the `isiguard` binary. No network: the provider is
//! always `none` or unconfigured.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const GROUND_TRUTH: &str = "Do not take if pregnant. Consult your doctor.";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("isi.txt"), GROUND_TRUTH).unwrap();
        Self { dir }
    }

    fn document(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn ad(&self, isi_body: &str) -> PathBuf {
        self.document(
            "ad.md",
            &format!("# Acme Tablets\n\nFeel better fast.\n\n## Important Safety Information\n\n{isi_body}\n"),
        )
    }

    fn ground_truth(&self) -> PathBuf {
        self.dir.path().join("isi.txt")
    }
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("isiguard").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY");
    cmd
}

#[test]
fn help_lists_verify() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("verify"));
}

#[test]
fn verbatim_document_is_compliant() {
    let fixture = Fixture::new();
    let document = fixture.ad(GROUND_TRUTH);

    cmd()
        .arg("verify")
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .success()
        .stdout(predicate::str::contains("Composite score:   100.0"))
        .stdout(predicate::str::contains("Severity:          compliant"))
        .stdout(predicate::str::contains("Missing content: none"))
        .stdout(predicate::str::contains("Consolidated ISI:"));
}

#[test]
fn omission_still_exits_zero() {
    let fixture = Fixture::new();
    let document = fixture.ad("Consult your doctor.");

    cmd()
        .args(["verify", "--provider", "none"])
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("critical_omission"))
        .stdout(predicate::str::contains("  - Do not take if pregnant."));
}

#[test]
fn word_edits_are_listed() {
    let fixture = Fixture::new();
    let document = fixture.ad("Do not take if. Consult your doctor.");

    cmd()
        .arg("verify")
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .success()
        .stdout(predicate::str::contains("Edits (1):"))
        .stdout(predicate::str::contains("  1. missing: 'pregnant'"));
}

#[test]
fn no_candidates_is_reported() {
    let fixture = Fixture::new();
    let document = fixture.document("promo.txt", "Feel better fast.\n\nBuy now!");

    cmd()
        .arg("verify")
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .success()
        .stdout(predicate::str::contains("No ISI candidates found"))
        .stdout(predicate::str::contains("Composite score:   0.0"));
}

#[test]
fn json_output_is_the_outcome() {
    let fixture = Fixture::new();
    let document = fixture.ad(GROUND_TRUTH);

    let output = cmd()
        .args(["verify", "--json"])
        .arg(fixture.ground_truth())
        .arg(&document)
        .output()
        .unwrap();

    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["verdict"]["composite_score"], 100.0);
    assert_eq!(outcome["verdict"]["reasoning_source"], "deterministic");
    assert_eq!(outcome["trace"]["stage"]["stage"], "done");
}

#[test]
fn layout_failure_exits_one() {
    let fixture = Fixture::new();
    let document = fixture.document("ad.pdf", "%PDF-1.7");

    cmd()
        .args(["verify", "--layout", "text"])
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No verdict."))
        .stderr(predicate::str::contains("pipeline failed at layout"));
}

#[test]
fn missing_document_exits_two() {
    let fixture = Fixture::new();

    cmd()
        .arg("verify")
        .arg(fixture.ground_truth())
        .arg(fixture.dir.path().join("nope.md"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn invalid_config_exits_two() {
    let fixture = Fixture::new();
    let document = fixture.ad(GROUND_TRUTH);
    let config = fixture.document("isiguard.yaml", "runtime:\n  retry:\n    max_attempts: 0\n");

    cmd()
        .arg("verify")
        .arg(fixture.ground_truth())
        .arg(&document)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_attempts"));
}

#[test]
fn unconfigured_provider_exits_two() {
    let fixture = Fixture::new();
    let document = fixture.ad(GROUND_TRUTH);

    cmd()
        .args(["verify", "--provider", "anthropic"])
        .arg(fixture.ground_truth())
        .arg(&document)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    cmd().args(["verify", "--frobnicate"]).assert().code(2);
}
