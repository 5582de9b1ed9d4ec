//! Integration tests for the fontis CLI.
//!
//! Each test invokes the `fontis` binary via `assert_cmd` and checks the
//! exit code and the outcome printed on stdout. Tests that need a real
//! repository build one with git and are skipped when git is missing.

#![allow(deprecated)] // cargo_bin deprecation, macro replacement not yet stable

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;

const FPR: &str = "9FA64B92F95E706BF28E2CA6484010B5CDC576E2";

/// Convenience: get a `Command` for the `fontis` binary.
fn fontis() -> Command {
    Command::cargo_bin("fontis").expect("fontis binary not found")
}

/// Positional arguments for a component that is never reached.
fn unreachable_component() -> [&'static str; 4] {
    [
        "https://git.example.org/core-admin.git",
        "/nonexistent/fontis/component",
        "/nonexistent/fontis/keyring",
        "/nonexistent/fontis/keys",
    ]
}

/// A scratch root whose paths satisfy the component directory grammar,
/// holding an upstream repository with one commit on `main`.
fn upstream() -> Option<(tempfile::TempDir, PathBuf)> {
    which::which("git").ok()?;
    let tmp = tempfile::Builder::new().prefix("fontis").tempdir().ok()?;
    let root = tmp.path().display().to_string();
    if !root.starts_with('/')
        || !root
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
    {
        return None;
    }

    let repo = tmp.path().join("upstream");
    std::fs::create_dir_all(&repo).expect("mkdir upstream");
    std::fs::write(repo.join("README.md"), "# component\n").expect("write readme");
    let steps: [&[&str]; 4] = [
        &["init", "-q"],
        &["symbolic-ref", "HEAD", "refs/heads/main"],
        &["add", "."],
        &[
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@test.com",
            "-c",
            "commit.gpgSign=false",
            "commit",
            "-q",
            "-m",
            "initial",
        ],
    ];
    for args in steps {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(&repo)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    }
    Some((tmp, repo))
}

fn component_args(root: &Path, repo: &Path) -> Vec<String> {
    vec![
        repo.display().to_string(),
        root.join("work").display().to_string(),
        root.join("keyring").display().to_string(),
        root.join("keys").display().to_string(),
    ]
}

#[test]
fn help_lists_policy_flags() {
    fontis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--maintainer"))
        .stdout(predicate::str::contains("--trust-all-keys"))
        .stdout(predicate::str::contains("--less-secure-signed-commits-sufficient"))
        .stdout(predicate::str::contains("--minimum-distinct-maintainers"));
}

#[test]
fn invalid_branch_exits_one() {
    fontis()
        .args(unreachable_component())
        .args(["--git-branch", ".hidden"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid branch .hidden"));
}

#[test]
fn relative_component_directory_exits_one() {
    fontis()
        .args([
            "https://git.example.org/core-admin.git",
            "relative/component",
            "/tmp/keyring",
            "/tmp/keys",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Invalid repository directory relative/component",
        ));
}

#[test]
fn malformed_maintainer_exits_one() {
    fontis()
        .args(unreachable_component())
        .args(["--maintainer", "DEADBEEF"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid maintainer provided: DEADBEEF"));
}

#[test]
fn maintainer_with_trust_all_keys_exits_one() {
    fontis()
        .args(unreachable_component())
        .args(["--maintainer", FPR, "--trust-all-keys"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "--maintainer cannot be used together with --trust-all-keys",
        ));
}

#[test]
fn missing_verifier_exits_one() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("config.toml");
    std::fs::write(&config, "gpg_candidates = [\"/nonexistent/gpg-sq\"]\n")
        .expect("write config");

    fontis()
        .args(unreachable_component())
        .args(["--maintainer", FPR])
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Cannot find GnuPG"));
}

#[test]
fn unreadable_config_exits_one() {
    fontis()
        .args(unreachable_component())
        .args(["--config", "/nonexistent/fontis.toml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("cannot read configuration"));
}

#[test]
fn unverified_clone_reports_json_outcome() {
    let Some((tmp, repo)) = upstream() else { return };

    let output = fontis()
        .args(component_args(tmp.path(), &repo))
        .args(["--insecure-skip-checking", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("stdout is JSON");
    assert_eq!(json["outcome"], "integrated");
    assert_eq!(json["branch"], "main");
    assert!(json["verification"].is_null());
    assert!(tmp.path().join("work/README.md").is_file());
}

#[test]
fn versions_only_without_tag_exits_zero() {
    let Some((tmp, repo)) = upstream() else { return };

    fontis()
        .args(component_args(tmp.path(), &repo))
        .args(["--insecure-skip-checking", "--fetch-versions-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No version tag."));
    assert!(!tmp.path().join("work").exists());
}

#[test]
fn missing_branch_with_ignore_missing_exits_zero() {
    let Some((tmp, repo)) = upstream() else { return };

    fontis()
        .args(component_args(tmp.path(), &repo))
        .args(["--insecure-skip-checking", "--ignore-missing", "--git-branch", "gone"])
        .assert()
        .success();
}

#[test]
fn missing_branch_reports_git_output() {
    let Some((tmp, repo)) = upstream() else { return };

    fontis()
        .args(component_args(tmp.path(), &repo))
        .args(["--insecure-skip-checking", "--git-branch", "gone"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("args:"))
        .stdout(predicate::str::contains("stderr:"));
}
