use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn doctor_reads_provided_config_path() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("vault")).unwrap();
    let cfg = tmp.path().join("mdpress.toml");
    let toml = r#"
version = 1
vault_root = "vault"
output_dir = "{{vault_root}}/_build"
concurrency = 2

[processors]
pre = ["$normalize_unicode"]

[book]
enabled = true
title = "Field Notes"

[[book.parts]]
notes = ["a"]
"#;
    write_file(&cfg, toml);

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdpress"));
    cmd.args(["doctor", "--config", cfg.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   mdpress doctor"))
        .stdout(predicate::str::contains("vault_root: "))
        .stdout(predicate::str::contains("_build"))
        .stdout(predicate::str::contains("concurrency: 2"))
        .stdout(predicate::str::contains("processors.pre:  $normalize_unicode"))
        .stdout(predicate::str::contains("book: 'Field Notes' (1 parts)"));
}

#[test]
fn doctor_uses_xdg_default_when_present() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join("vault");
    fs::create_dir_all(&vault).unwrap();
    write_file(
        &tmp.path().join("mdpress").join("config.toml"),
        &format!("version = 1\nvault_root = \"{}\"\n", vault.display()),
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdpress"));
    cmd.current_dir(tmp.path());
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   mdpress doctor"))
        .stdout(predicate::str::contains("book: disabled"));
}

#[test]
fn doctor_fails_when_config_missing() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdpress"));
    cmd.current_dir(tmp.path());
    cmd.env("XDG_CONFIG_HOME", tmp.path()); // empty dir → no config
    cmd.arg("doctor");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("FAIL mdpress doctor"))
        .stdout(predicate::str::contains("looked for:"));
}

#[test]
fn doctor_flags_missing_vault() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("mdpress.toml");
    write_file(&cfg, "version = 1\nvault_root = \"nowhere\"\n");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdpress"));
    cmd.arg("--config").arg(&cfg).arg("doctor");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("WARN vault_root does not exist"));
}
