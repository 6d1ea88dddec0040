//! End-to-end coverage of the `stackwatch` binary's non-daemon
//! subcommands, driven through the actual CLI the way an operator
//! would invoke it. The daemon (`run`) isn't covered here since it
//! loops until a signal; its pieces are unit-tested individually in
//! `scheduler`/`monitor`/`orchestrator`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

/// Every invocation points `--config` at a file that doesn't exist (so
/// `StackwatchConfig::load` falls back to defaults) and overrides the
/// four storage paths via env vars into a throwaway tempdir, so each
/// test gets an isolated, auto-migrated database.
fn stackwatch_in(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("stackwatch").expect("binary should build");
    cmd.arg("--config").arg(dir.join("no-such-config.toml"));
    cmd.env("STACKWATCH_DB_PATH", dir.join("stackwatch.db"));
    cmd.env("STACKWATCH_DOWNLOAD_DIR", dir.join("downloads"));
    cmd.env("STACKWATCH_ORGANIZE_DIR", dir.join("library"));
    cmd.env("STACKWATCH_CACHE_DIR", dir.join("cache"));
    cmd
}

#[test]
fn test_config_command_prints_effective_sections() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[storage]"))
        .stdout(predicate::str::contains("[matching]"))
        .stdout(predicate::str::contains("[providers]"))
        .stdout(predicate::str::contains("[client]"));
}

#[test]
fn test_track_add_then_list_roundtrip() {
    let dir = tempdir().unwrap();

    stackwatch_in(dir.path())
        .args(["track", "add", "Wired Magazine", "--language", "English", "--category", "Magazines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wired Magazine"));

    stackwatch_in(dir.path())
        .args(["track", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wired Magazine"))
        .stdout(predicate::str::contains("all"));
}

#[test]
fn test_track_add_new_mode_lists_as_new() {
    let dir = tempdir().unwrap();

    stackwatch_in(dir.path())
        .args(["track", "add", "PC Gamer", "--mode", "new"])
        .assert()
        .success();

    stackwatch_in(dir.path())
        .args(["track", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new"))
        .stdout(predicate::str::contains("PC Gamer"));
}

#[test]
fn test_track_list_empty_by_default() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path())
        .args(["track", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no active tracking records"));
}

#[test]
fn test_track_remove_stops_tracking() {
    let dir = tempdir().unwrap();

    stackwatch_in(dir.path())
        .args(["track", "add", "2600", "--olid", "2600-quarterly"])
        .assert()
        .success();

    stackwatch_in(dir.path())
        .args(["track", "remove", "2600-quarterly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped tracking"));

    stackwatch_in(dir.path())
        .args(["track", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no active tracking records"));
}

#[test]
fn test_track_remove_unknown_olid_is_a_no_op() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path())
        .args(["track", "remove", "does-not-exist"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no tracking record with olid"));
}

#[test]
fn test_library_list_empty_by_default() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path())
        .args(["library", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("library is empty"));
}

#[test]
fn test_import_nonexistent_file_fails() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path())
        .arg("import")
        .arg(dir.path().join("does-not-exist.pdf"))
        .assert()
        .failure();
}

#[test]
fn test_auth_set_password_then_reject_second_call() {
    let dir = tempdir().unwrap();

    stackwatch_in(dir.path())
        .args(["auth", "set-password", "--username", "admin"])
        .write_stdin("hunter2\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("credentials set for admin"));

    stackwatch_in(dir.path())
        .args(["auth", "set-password", "--username", "admin"])
        .write_stdin("hunter2\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials already exist"));
}

#[test]
fn test_missing_subcommand_prints_usage_and_fails() {
    let dir = tempdir().unwrap();
    stackwatch_in(dir.path()).assert().failure();
}
