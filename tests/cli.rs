use assert_cmd::Command;
use std::fs;
use std::path::Path;

const REPORT: &str = "SF:a\nDA:1,1\nDA:2,0\nDA:3,1\nFNF:1\nFNH:1\nend_of_record\n\
                      SF:b\nDA:1,1\nDA:2,1\nFNF:1\nFNH:0\nend_of_record\n";

fn covreport(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("covreport").unwrap();
    cmd.current_dir(dir)
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("GITHUB_EVENT_PATH")
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1");
    cmd
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("coverage")).unwrap();
    fs::write(dir.path().join("coverage/lcov.info"), REPORT).unwrap();
    dir
}

#[test]
fn check_fails_below_threshold() {
    let dir = workspace();
    let output = covreport(dir.path())
        .args(["check", "--threshold", "lines=90", "--threshold", "functions=50"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lines coverage 80% is below threshold 90%"));
    assert!(stdout.contains("1 of 2 thresholds failed"));
}

#[test]
fn check_passes_with_config_thresholds() {
    let dir = workspace();
    fs::write(
        dir.path().join("covreport.toml"),
        "[thresholds]\nlines = 80\nfunctions = 50\n",
    )
    .unwrap();

    let output = covreport(dir.path()).arg("check").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("All 2 thresholds passed"));
}

#[test]
fn run_without_github_context_still_gates() {
    let dir = workspace();
    let output = covreport(dir.path())
        .args(["run", "--min-coverage", "85", "--output", "comment.md"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Coverage thresholds not met:"));
    assert!(stderr.contains("Lines coverage 80% is below threshold 85%"));

    let comment = fs::read_to_string(dir.path().join("comment.md")).unwrap();
    assert!(comment.contains("## Coverage Report"));
}

#[test]
fn summary_prints_json() {
    let dir = workspace();
    let output = covreport(dir.path()).arg("summary").output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"]["lines"]["pct"], 80.0);
    assert_eq!(json["a"]["uncoveredLines"], serde_json::json!([2]));
    assert_eq!(json["b"]["functions"]["covered"], 0);
}

#[test]
fn missing_report_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = covreport(dir.path())
        .args(["check", "--lcov-path", "nowhere/lcov.info"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nowhere/lcov.info"));
}

#[test]
fn invalid_threshold_flag_is_rejected() {
    let dir = workspace();
    let output = covreport(dir.path())
        .args(["check", "--threshold", "paths=10"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown coverage metric"));
}
