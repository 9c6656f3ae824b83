use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../fisco-core/tests/fixtures")
        .join(name)
}

/// Config with the LLM tier off and the cache persisted inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.json");
    let config = serde_json::json!({
        "llm": { "enabled": false },
        "classifier": { "cache_path": dir.join("cache.json") },
    });
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn fisco(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fisco").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn process_prints_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = fisco(&config)
        .arg("process")
        .arg(fixture("nfe_valid.xml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["issues"], serde_json::json!([]));
    assert_eq!(doc["classification"]["cost_center"], "TI - Equipamentos");
    assert_eq!(doc["invoice"]["document_type"], "NFe");
}

#[test]
fn process_text_lists_issues() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .args(["process", "--format", "text"])
        .arg(fixture("nfce_short_cnpj.xml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("CNPJ_FORMAT"))
        .stderr(predicate::str::contains("validation issue"));
}

#[test]
fn process_strict_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .args(["process", "--strict"])
        .arg(fixture("nfce_short_cnpj.xml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn process_rejects_doctype() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .arg("process")
        .arg(fixture("nfe_xxe.xml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("DOCTYPE"));
}

#[test]
fn process_writes_csv_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let out = dir.path().join("out.csv");

    fisco(&config)
        .args(["process", "--format", "csv", "--output"])
        .arg(&out)
        .arg(fixture("nfe_magazine_luiza.xml"))
        .assert()
        .success();

    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("document_key,document_type"));
    assert!(csv.contains("purchase"));
    assert!(csv.contains("TI - Equipamentos"));
}

#[test]
fn process_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .args(["process", "does-not-exist.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

fn batch_dir(dir: &Path, names: &[&str]) -> PathBuf {
    let input = dir.join("in");
    fs::create_dir_all(&input).unwrap();
    for name in names {
        fs::copy(fixture(name), input.join(name)).unwrap();
    }
    fs::write(input.join("notes.txt"), "not a document").unwrap();
    input
}

#[test]
fn batch_writes_outputs_and_summary() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let input = batch_dir(
        dir.path(),
        &["nfe_valid.xml", "nfe_magazine_luiza.xml", "nfe_xxe.xml"],
    );
    let out = dir.path().join("out");

    fisco(&config)
        .args(["batch", "-j", "2", "--summary", "--continue-on-error", "--output-dir"])
        .arg(&out)
        .arg(format!("{}/*.xml", input.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files"))
        .stdout(predicate::str::contains("nfe_xxe.xml"));

    assert!(out.join("nfe_valid.json").exists());
    assert!(out.join("nfe_magazine_luiza.json").exists());
    assert!(!out.join("nfe_xxe.json").exists());
    assert!(out.join("batch.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.contains("nfe_xxe.xml,error"));
    assert!(summary.contains("nfe_valid.xml,success"));
}

#[test]
fn batch_fails_without_continue_on_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let input = batch_dir(dir.path(), &["nfe_valid.xml", "nfe_xxe.xml"]);

    fisco(&config)
        .arg("batch")
        .arg(format!("{}/*.xml", input.display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed for 1 of 2 files"));
}

#[test]
fn batch_without_matches() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .arg("batch")
        .arg(format!("{}/*.xml", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn cache_persists_between_runs() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    fisco(&config)
        .arg("process")
        .arg(fixture("nfe_valid.xml"))
        .assert()
        .success();
    assert!(dir.path().join("cache.json").exists());

    let output = fisco(&config)
        .args(["cache", "stats", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["entries"], 1);

    fisco(&config)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));

    fisco(&config)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:    0"));
}

#[test]
fn cache_requires_configured_path() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{}").unwrap();

    fisco(&config)
        .args(["cache", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cache file configured"));
}

#[test]
fn config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nested").join("config.json");

    fisco(&config).args(["config", "init"]).assert().success();
    assert!(config.exists());

    fisco(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    fisco(&config)
        .args(["config", "get", "validation.tolerance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.02"));

    fisco(&config)
        .args(["config", "set", "batch.jobs", "2"])
        .assert()
        .success();
    fisco(&config)
        .args(["config", "get", "batch.jobs"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));

    fisco(&config)
        .args(["config", "set", "batch.jobs", "0"])
        .assert()
        .failure();
    fisco(&config)
        .args(["config", "get", "no.such.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn config_path_reports_status() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");

    fisco(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));
}
