//! Smoke tests for the dialogdump binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    config: std::path::PathBuf,
    archive: std::path::PathBuf,
    backup: std::path::PathBuf,
}

impl Fixture {
    fn new(dialogs: &[(&str, &[i64])]) -> Self {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("archive");
        let backup = root.path().join("backup");
        write_archive(&archive, dialogs);

        let config = root.path().join("config.toml");
        fs::write(&config, "").unwrap();

        Self {
            _root: root,
            config,
            archive,
            backup,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("dialogdump").unwrap();
        cmd.env_remove("RUST_LOG")
            .arg("--quiet")
            .arg("--config")
            .arg(&self.config)
            .arg("--backup-dir")
            .arg(&self.backup);
        cmd
    }

    fn backup(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("backup").arg("--archive").arg(&self.archive);
        cmd
    }
}

fn write_archive(root: &Path, dialogs: &[(&str, &[i64])]) {
    fs::create_dir_all(root.join("messages")).unwrap();
    let list: Vec<_> = dialogs
        .iter()
        .map(|(id, _)| serde_json::json!({"id": id, "name": format!("Chat {id}")}))
        .collect();
    fs::write(root.join("dialogs.json"), serde_json::to_string(&list).unwrap()).unwrap();
    for (id, ids) in dialogs {
        let body: String = ids
            .iter()
            .map(|m| format!("{{\"id\": {m}, \"text\": \"hello {m}\"}}\n"))
            .collect();
        fs::write(root.join("messages").join(format!("{id}.ndjson")), body).unwrap();
    }
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("dialogdump").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("reset"));
}

#[test]
fn test_backup_help() {
    let mut cmd = Command::cargo_bin("dialogdump").unwrap();
    cmd.arg("backup").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dumper option as key=value"));
}

#[test]
fn test_dumpers_lists_builtins() {
    let mut cmd = Command::cargo_bin("dialogdump").unwrap();
    cmd.arg("dumpers");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ndjson"))
        .stdout(predicate::str::contains("markdown"));
}

#[test]
fn test_backup_then_rerun_exports_nothing_new() {
    let fx = Fixture::new(&[("alice", &[3, 2, 1]), ("bob", &[7])]);

    fx.backup()
        .assert()
        .success()
        .stdout(predicate::str::contains("4 messages exported"));
    assert!(fx.backup.join("ndjson").join("alice.ndjson").exists());

    fx.backup()
        .assert()
        .success()
        .stdout(predicate::str::contains("0 messages exported"));
}

#[test]
fn test_status_json_reports_last_id() {
    let fx = Fixture::new(&[("alice", &[3, 2, 1])]);
    fx.backup().assert().success();

    let output = fx.cmd().arg("status").arg("--json").output().unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["dialog_id"], "alice");
    assert_eq!(rows[0]["last_id"], 3);
    assert_eq!(rows[0]["custom_data"]["total_dumped"], 3);
}

#[test]
fn test_unknown_dumper_is_config_error() {
    let fx = Fixture::new(&[("alice", &[1])]);

    fx.backup()
        .arg("--dumper")
        .arg("carrier-pigeon")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown dumper"));
}

#[test]
fn test_unknown_dumper_option_is_config_error() {
    let fx = Fixture::new(&[("alice", &[1])]);

    fx.backup()
        .arg("-o")
        .arg("colour=blue")
        .assert()
        .code(3);
}

#[test]
fn test_bad_timestamp_format_is_config_error() {
    let fx = Fixture::new(&[("alice", &[1])]);

    fx.backup()
        .arg("--dumper")
        .arg("markdown")
        .arg("-o")
        .arg("timestamp_format=%Q")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("timestamp_format"));
    assert!(!fx.backup.join("progress.lock").exists());
}

#[test]
fn test_missing_archive_is_config_error() {
    let fx = Fixture::new(&[]);

    fx.cmd()
        .arg("backup")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no archive configured"));
}

#[test]
fn test_failed_dialog_sets_exit_code() {
    let fx = Fixture::new(&[("shuffled", &[1, 3, 2]), ("fine", &[2, 1])]);

    fx.backup()
        .assert()
        .code(4)
        .stdout(predicate::str::contains("1 failed"));
    assert!(fx.backup.join("progress").join("fine.json").exists());
}

#[test]
fn test_reset_forgets_progress() {
    let fx = Fixture::new(&[("alice", &[2, 1])]);
    fx.backup().assert().success();

    fx.cmd()
        .arg("reset")
        .arg("alice")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset progress"));

    fx.cmd().arg("reset").arg("alice").assert().code(1);

    fx.backup()
        .assert()
        .success()
        .stdout(predicate::str::contains("2 messages exported"));
}
