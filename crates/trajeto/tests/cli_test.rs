//! Integration tests for the `trajeto` CLI binary.
//!
//! These tests cover argument parsing, help output, shell completions,
//! config and history handling, and error exit codes, all without a
//! live notification server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `trajeto` binary with env isolation.
///
/// Clears all `TRAJETO_*` env vars and points config and data
/// directories into `home` so tests never touch real configuration.
fn trajeto_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("trajeto");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TRAJETO_PROFILE")
        .env_remove("TRAJETO_SERVER")
        .env_remove("TRAJETO_TOKEN")
        .env_remove("TRAJETO_HISTORY_FILE")
        .env_remove("TRAJETO_OUTPUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const FIRST_ID: &str = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";
const SECOND_ID: &str = "9f8e7d6c-2fa1-11d2-883f-0016d3cca427";

/// Two unread entries, newest first, in the on-disk history format.
fn write_history(path: &Path) {
    let json = format!(
        r#"[
  {{
    "id": "{FIRST_ID}",
    "notification": {{
      "type": "embarque",
      "priority": "alta",
      "message": "Aluno embarcou na van 12",
      "timestamp": "2026-03-02T07:15:00Z"
    }},
    "receivedAt": "2026-03-02T07:15:01Z",
    "read": false
  }},
  {{
    "id": "{SECOND_ID}",
    "notification": {{
      "type": "atraso",
      "priority": "media",
      "title": "Van atrasada",
      "timestamp": "2026-03-02T07:00:00Z"
    }},
    "receivedAt": "2026-03-02T07:00:02Z",
    "read": false
  }}
]"#
    );
    std::fs::write(path, json).unwrap();
}

fn write_config(home: &Path, body: &str) {
    let dir = home.join("config").join("trajeto");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = trajeto_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("listen")
            .and(predicate::str::contains("history"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trajeto"));
}

#[test]
fn test_listen_help_lists_filters() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .args(["listen", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--type")
                .and(predicate::str::contains("--min-priority"))
                .and(predicate::str::contains("--no-fallback")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trajeto"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_follows_xdg() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trajeto").and(predicate::str::contains("config.toml")));
}

#[test]
fn test_config_show_redacts_tokens() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        r#"
default_profile = "escola"

[profiles.escola]
server = "wss://escola.example.com/ws"
token = "super-secret-token"
"#,
    );

    trajeto_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.escola]")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("super-secret-token").not()),
        );
}

#[test]
fn test_config_profiles_plain() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        r#"
[profiles.norte]
server = "wss://norte.example.com/ws"

[profiles.sul]
server = "wss://sul.example.com/ws"
"#,
    );

    trajeto_cmd(home.path())
        .args(["config", "profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout("norte\nsul\n");
}

#[test]
fn test_config_use_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    let output = trajeto_cmd(home.path())
        .args(["config", "use", "nowhere"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

// ── Listen: failures before any connection ──────────────────────────

#[test]
fn test_listen_without_config() {
    let home = tempfile::tempdir().unwrap();
    let output = trajeto_cmd(home.path()).arg("listen").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(
        text.contains("config init"),
        "Expected a hint at config init:\n{text}"
    );
}

#[test]
fn test_listen_rejects_http_server() {
    let home = tempfile::tempdir().unwrap();
    let output = trajeto_cmd(home.path())
        .args(["listen", "--server", "https://app.example.com/ws", "--token", "t"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("ws://"));
}

#[test]
fn test_listen_rejects_empty_type_filter() {
    let home = tempfile::tempdir().unwrap();
    let output = trajeto_cmd(home.path())
        .args([
            "listen",
            "--server",
            "wss://app.example.com/ws",
            "--token",
            "t",
            "--type",
            "",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── History ─────────────────────────────────────────────────────────

#[test]
fn test_history_list_json() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("history.json");
    write_history(&file);

    trajeto_cmd(home.path())
        .args(["history", "list", "-o", "json", "--history-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"embarque\"")
                .and(predicate::str::contains("\"atraso\""))
                .and(predicate::str::contains("receivedAt")),
        );
}

#[test]
fn test_history_list_missing_file_is_empty() {
    let home = tempfile::tempdir().unwrap();
    trajeto_cmd(home.path())
        .args(["history", "list", "-o", "plain", "--history-file"])
        .arg(home.path().join("absent.json"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_history_read_by_prefix() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("history.json");
    write_history(&file);

    trajeto_cmd(home.path())
        .args(["history", "read", "1b4e28ba", "--history-file"])
        .arg(&file)
        .assert()
        .success();

    trajeto_cmd(home.path())
        .args(["history", "list", "--unread", "-o", "plain", "--history-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(format!("{SECOND_ID}\n"));
}

#[test]
fn test_history_read_unknown_entry() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("history.json");
    write_history(&file);

    let output = trajeto_cmd(home.path())
        .args(["history", "read", "ffff", "--history-file"])
        .arg(&file)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_history_read_all() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("history.json");
    write_history(&file);

    trajeto_cmd(home.path())
        .args(["history", "read", "--all", "--history-file"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Marked 2 entries"));

    trajeto_cmd(home.path())
        .args(["history", "list", "--unread", "-o", "plain", "--history-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_history_clear_requires_yes() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("history.json");
    write_history(&file);

    let output = trajeto_cmd(home.path())
        .args(["history", "clear", "--history-file"])
        .arg(&file)
        .write_stdin("")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    trajeto_cmd(home.path())
        .args(["history", "clear", "--yes", "--history-file"])
        .arg(&file)
        .assert()
        .success();

    let remaining: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(remaining, serde_json::json!([]));
}
