//! Integration tests for `esdebug version`.

use serial_test::serial;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "esdebug-cli", "--bin", "esdebug", "--"]);
    cmd
}

#[test]
#[serial]
fn test_version_prints_name_and_version() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.trim().starts_with(&format!("esdebug {}", env!("CARGO_PKG_VERSION"))),
        "unexpected stdout: {stdout}"
    );
}

#[test]
#[serial]
fn test_version_json_is_valid_json() {
    let output = cargo_bin()
        .args(["--json", "version"])
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be valid JSON");
    assert_eq!(json["name"], "esdebug");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
