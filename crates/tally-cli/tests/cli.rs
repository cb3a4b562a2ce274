use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tally_exchange::ExchangeDir;
use tempfile::TempDir;

fn tally() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    for var in ["TALLY_CONFIG", "TALLY_PACKAGES", "TALLY_CODE_BASE", "TALLY_EXCHANGE_DIR"] {
        cmd.env_remove(var);
    }
    cmd
}

/// Writes a two-class code base and a config pointing at it.
fn setup(tmp: &Path, packages: &[&str]) -> std::path::PathBuf {
    let classes = tmp.join("classes/com/acme");
    fs::create_dir_all(&classes).unwrap();
    fs::write(
        classes.join("Foo.type.json"),
        r#"{"name":"com.acme.Foo","methods":[{"name":"a"},{"name":"getB","returns":"int"}]}"#,
    )
    .unwrap();
    fs::write(
        classes.join("Bar.type.json"),
        r#"{"name":"com.acme.Bar","superclass":"com.acme.Foo","methods":[{"name":"c","visibility":"protected"}]}"#,
    )
    .unwrap();

    let config = serde_json::json!({
        "app_name": "shop",
        "code_base": [tmp.join("classes")],
        "packages": packages,
        "exchange_dir": tmp.join("exchange"),
    });
    let path = tmp.join("tally.json");
    fs::write(&path, config.to_string()).unwrap();
    path
}

#[test]
fn help_lists_commands() {
    tally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("pending"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn scan_prints_tracked_signatures() {
    let tmp = TempDir::new().unwrap();
    let config = setup(tmp.path(), &["com.acme"]);

    let output = tally()
        .args(["--config", config.to_str().unwrap(), "scan", "--full"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let model: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tracked: Vec<&str> = model["tracked"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    // Trivial getter and protected method are filtered out.
    assert_eq!(tracked, vec!["public void com.acme.Foo.a()"]);
    assert_eq!(
        model["overrides"]["public void com.acme.Bar.a()"],
        "public void com.acme.Foo.a()"
    );
}

#[test]
fn scan_summary_counts_classes() {
    let tmp = TempDir::new().unwrap();
    let config = setup(tmp.path(), &["com.acme"]);

    let output = tally()
        .args(["--config", config.to_str().unwrap(), "scan"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["files"], 2);
    assert_eq!(summary["classes"], 2);
    assert_eq!(summary["tracked"], 1);
    assert!(summary["fingerprint"].as_str().unwrap().starts_with("sha256:"));
}

#[test]
fn scan_without_packages_fails() {
    let tmp = TempDir::new().unwrap();
    let config = setup(tmp.path(), &[]);

    tally()
        .args(["--config", config.to_str().unwrap(), "scan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package"));
}

#[test]
fn fingerprint_counts_descriptor_files() {
    let tmp = TempDir::new().unwrap();
    let config = setup(tmp.path(), &["com.acme"]);
    fs::write(tmp.path().join("classes/README.md"), "not a descriptor").unwrap();

    let output = tally()
        .args(["--config", config.to_str().unwrap(), "fingerprint"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let fingerprint: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(fingerprint["count"], 2);
}

#[test]
fn pending_lists_exchange_files() {
    let tmp = TempDir::new().unwrap();
    let config = setup(tmp.path(), &["com.acme"]);
    let exchange = ExchangeDir::open(tmp.path().join("exchange")).unwrap();
    exchange.publish(b"one", "invocations-00000001").unwrap();
    exchange.publish(b"two", "codebase-00000001").unwrap();

    let output = tally()
        .args([
            "--config",
            config.to_str().unwrap(),
            "pending",
            "--pattern",
            "invocations-*",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let names: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(names, vec!["invocations-00000001.pending"]);
}
