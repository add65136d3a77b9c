mod common;

use assert_cmd::Command;
use common::GOLDEN_RESULT;
use indoc::indoc;
use tempfile::TempDir;

/// A `signer` invocation isolated from the caller's environment and any
/// `.signer.toml` above the working directory.
fn signer(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("signer").expect("signer binary should be built");
    cmd.current_dir(dir.path())
        .env_remove("SIGNER_BUFFER_CAPACITY")
        .env_remove("SIGNER_MAX_IN_FLIGHT")
        .env_remove("SIGNER_SALT")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("Failed to execute signer");
    assert!(
        output.status.success(),
        "signer failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_run_prints_golden_result() {
    let dir = TempDir::new().unwrap();
    assert_eq!(stdout_of(signer(&dir).arg("run")), GOLDEN_RESULT);
}

#[test]
fn test_run_with_seed_flag() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(signer(&dir).args(["run", "--seed", "1", "--buffer-capacity", "1"]));
    assert_eq!(
        out,
        "4958044192186797981418233587017209679042592862002427381542"
    );
}

#[test]
fn test_run_json_reports_stages() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(signer(&dir).args(["run", "--seed", "0,1", "--format", "json"]));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(report["result"].as_str().unwrap().split('_').count(), 2);
    let stages = report["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 4);
    assert_eq!(stages[0]["name"], "Generator");
    assert_eq!(stages[3]["emitted"], 1);
}

#[test]
fn test_run_rejects_zero_capacity() {
    let dir = TempDir::new().unwrap();
    let output = signer(&dir)
        .args(["run", "--buffer-capacity", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("buffer_capacity"));
}

#[test]
fn test_run_with_in_flight_limit_of_one() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(signer(&dir).args(["run", "--max-in-flight", "1"]));
    assert_eq!(out, GOLDEN_RESULT);
}

#[test]
fn test_run_rejects_zero_in_flight_limit() {
    let dir = TempDir::new().unwrap();
    let output = signer(&dir)
        .args(["run", "--max-in-flight", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_in_flight"));
}

#[test]
fn test_run_reads_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".signer.toml"),
        indoc! {r#"
            seed = [1]

            [pipeline]
            buffer_capacity = 2
        "#},
    )
    .unwrap();

    let out = stdout_of(signer(&dir).arg("run"));
    assert_eq!(
        out,
        "4958044192186797981418233587017209679042592862002427381542"
    );
}

#[test]
fn test_salt_env_changes_result() {
    let dir = TempDir::new().unwrap();
    let salted = stdout_of(signer(&dir).env("SIGNER_SALT", "pepper").args(["run", "--seed", "1"]));
    assert_ne!(
        salted,
        "4958044192186797981418233587017209679042592862002427381542"
    );
    assert!(!salted.is_empty());
}

#[test]
fn test_hash_subcommand() {
    let dir = TempDir::new().unwrap();
    assert_eq!(stdout_of(signer(&dir).args(["hash", "crc32", "0"])), "4108050209");
    assert_eq!(
        stdout_of(signer(&dir).args(["hash", "md5", ""])),
        "d41d8cd98f00b204e9800998ecf8427e"
    );
}

#[test]
fn test_config_subcommand_prints_effective_config() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(
        signer(&dir)
            .env("SIGNER_BUFFER_CAPACITY", "7")
            .arg("config"),
    );
    assert!(out.contains("buffer_capacity = 7"), "{out}");
    assert!(out.contains("restricted = \"md5\""), "{out}");
}
