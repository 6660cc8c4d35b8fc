//! Integration tests for the fsh-validator CLI
//!
//! These tests verify the CLI behavior end-to-end

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Helper function to create a test CLI command
#[allow(deprecated)]
fn cli() -> Command {
    Command::cargo_bin("fsh-validator").unwrap()
}

/// Minimal project: one FSH file with a patient instance and its
/// generated resource
fn create_test_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    fs::create_dir_all(base.join("input/fsh")).unwrap();
    fs::create_dir_all(base.join("fsh-generated/resources")).unwrap();

    fs::write(
        base.join("sushi-config.yaml"),
        "id: test.ig\ncanonical: http://example.org/fhir/test\nfhirVersion: 4.0.1\n",
    )
    .unwrap();
    fs::write(
        base.join("input/fsh/patients.fsh"),
        "Instance: pat1\nInstanceOf: Patient\n* gender = #female\n",
    )
    .unwrap();
    fs::write(
        base.join("fsh-generated/resources/Patient-pat1.json"),
        r#"{ "resourceType": "Patient", "id": "pat1", "gender": "female" }"#,
    )
    .unwrap();

    temp_dir
}

#[cfg(unix)]
fn fake_validator(dir: &Path, status: &str, exit_code: i32) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-validator");
    let script = format!(
        "#!/bin/sh\n\
         for arg in \"$@\"; do\n\
           case \"$arg\" in\n\
             *.json)\n\
               echo \"-- $arg ------------------------\"\n\
               echo \"{status}\"\n\
               echo \"  Error @ Patient.gender (line 1, col 1): bad code\"\n\
               echo \"------------------------------------\"\n\
               ;;\n\
           esac\n\
         done\n\
         exit {exit_code}\n"
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_help_command() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("FILENAMES"))
        .stdout(predicate::str::contains("--validator-path"));
}

#[test]
fn test_version_command() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(VERSION));
}

#[test]
fn test_filename_or_all_required() {
    cli().assert().failure().code(2);
}

#[test]
fn test_subdir_requires_all() {
    cli()
        .args(["obs.fsh", "--subdir", "labs"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_path_like_filename_rejected_before_indexing() {
    // The project does not even exist: the name check must come first
    cli()
        .args(["--no-color", "--project", "/nonexistent/project", "../secret.fsh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid file name '../secret.fsh'"));
}

#[test]
fn test_missing_project_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    cli()
        .arg("--project")
        .arg(temp_dir.path())
        .args(["--no-color", "--no-sushi", "--all"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not find fsh input path"));
}

#[test]
fn test_unknown_filename_is_fatal() {
    let project = create_test_project();
    let validator_dir = TempDir::new().unwrap();
    fs::write(validator_dir.path().join("validator_cli.jar"), b"").unwrap();

    cli()
        .arg("--project")
        .arg(project.path())
        .arg("--validator-path")
        .arg(validator_dir.path())
        .args(["--no-color", "--no-sushi", "missing.fsh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_validator_download_keeps_stdout_clean() {
    let project = create_test_project();
    let tools = TempDir::new().unwrap();

    // Nothing listens on the discard port, so the download fails fast
    let output = cli()
        .arg("--project")
        .arg(project.path())
        .arg("--validator-path")
        .arg(tools.path())
        .args([
            "--no-color",
            "--no-sushi",
            "--format",
            "json",
            "--validator-url",
            "http://127.0.0.1:9/validator_cli.jar",
            "patients.fsh",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Downloading FHIR validator"))
        .get_output()
        .clone();

    assert!(
        output.stdout.is_empty(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    assert!(!tools.path().join("validator_cli.jar").exists());
}

#[cfg(unix)]
#[test]
fn test_passing_run_prints_json_report() {
    let project = create_test_project();
    let tools = TempDir::new().unwrap();
    let validator = fake_validator(tools.path(), "Success: 0 errors, 0 warnings, 0 notes", 0);

    let output = cli()
        .arg("--project")
        .arg(project.path())
        .arg("--validator-path")
        .arg(&validator)
        .args(["--no-sushi", "--format", "json", "patients.fsh"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["passed"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["results"][0]["instance"], "pat1");
}

#[cfg(unix)]
#[test]
fn test_failed_validation_exits_with_one() {
    let project = create_test_project();
    let tools = TempDir::new().unwrap();
    let validator = fake_validator(tools.path(), "*FAILURE*: 1 errors, 0 warnings, 0 notes", 1);

    cli()
        .arg("--project")
        .arg(project.path())
        .arg("--validator-path")
        .arg(&validator)
        .args(["--no-color", "--no-sushi", "--all"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("Error @ Patient.gender"));
}
