//! End-to-end tests that drive the `bt` binary against a temporary database.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::TempDir;

fn bt_binary() -> String {
    env!("CARGO_BIN_EXE_bt").to_string()
}

/// A temp home with a config file pointing at a fresh database.
struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("bt.toml");
        let db = dir.path().join("data").join("bt.db");
        std::fs::write(
            &config,
            format!(
                "database_path = {:?}\ndefault_baby = \"b1\"\ndemo_babies = [\"sample\"]\n",
                db.display().to_string()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(bt_binary());
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("XDG_DATA_HOME", self.dir.path().join("share"))
            .env_remove("BT_DATABASE_PATH")
            .env_remove("BT_DEFAULT_BABY")
            .env_remove("BT_DEMO_BABIES")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().unwrap()
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    }

    fn events(&self) -> Vec<Value> {
        let output = self.run(&["events", "--json"]);
        assert_success(&output);
        String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("data").join("bt.db")
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "bt should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap()
}

#[test]
fn test_log_and_list_events() {
    let sandbox = Sandbox::new();

    let output = sandbox.run(&["log", "diaper", "--at", "10 minutes ago"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Logged diaper at "));
    assert!(exists(&sandbox.database()), "database should be created");

    let output = sandbox.run(&["log", "nursing", "--side", "left", "-d", "12m", "--notes", "ok"]);
    assert_success(&output);

    let events = sandbox.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "nursing");
    assert_eq!(events[0]["side"], "left");
    assert_eq!(events[0]["duration_secs"], 720);
    assert_eq!(events[0]["baby_id"], "b1");
    assert_eq!(events[1]["type"], "diaper");

    let output = sandbox.run(&["events", "--type", "diaper"]);
    assert_success(&output);
    let table = String::from_utf8(output.stdout).unwrap();
    assert!(table.starts_with("When"));
    assert_eq!(table.lines().count(), 3);
}

#[test]
fn test_sleep_validation_error_is_reported() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["sleep", "--start", "10 minutes ago", "--end", "20 minutes ago"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("End time must be after start time"));
    assert!(sandbox.events().is_empty());
}

#[test]
fn test_demo_baby_is_read_only() {
    let sandbox = Sandbox::new();
    for baby in ["demo", "demo-twins", "sample"] {
        let output = sandbox.run(&["--baby", baby, "log", "diaper"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Demo profiles are read-only"));
    }
}

#[test]
fn test_baby_override_scopes_events() {
    let sandbox = Sandbox::new();
    assert_success(&sandbox.run(&["--baby", "b2", "log", "bottle"]));
    assert!(sandbox.events().is_empty());

    let output = sandbox.run(&["--baby", "b2", "events", "--json"]);
    assert_success(&output);
    assert_eq!(String::from_utf8(output.stdout).unwrap().lines().count(), 1);
}

#[test]
fn test_track_session_is_saved() {
    let sandbox = Sandbox::new();
    let output = sandbox.run_with_stdin(
        &["track"],
        "nurse left\nswitch\nstop all good\nsleep 30 minutes ago\nwake-stop\nquit\n",
    );
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nursing started on left."));
    assert!(stdout.contains("Switched to right."));
    assert!(stdout.contains("Saved nursing"));
    assert!(stdout.contains("Saved sleep"));

    let events = sandbox.events();
    assert_eq!(events.len(), 2);
    let nursing = events.iter().find(|e| e["type"] == "nursing").unwrap();
    assert_eq!(nursing["side"], "right");
    assert_eq!(nursing["notes"], "all good");
    let sleep = events.iter().find(|e| e["type"] == "sleep").unwrap();
    assert!(sleep["duration_secs"].as_u64().unwrap() >= 1800);
}

#[test]
fn test_track_cancel_saves_nothing() {
    let sandbox = Sandbox::new();
    let output = sandbox.run_with_stdin(&["track"], "nurse right\ncancel\nquit\n");
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nursing session discarded."));
    assert!(sandbox.events().is_empty());
}

#[test]
fn test_edit_and_delete() {
    let sandbox = Sandbox::new();
    assert_success(&sandbox.run(&["log", "nursing", "--side", "left", "-d", "10m"]));
    let id = sandbox.events()[0]["id"].as_str().unwrap().to_string();

    assert_success(&sandbox.run(&["edit", &id, "--side", "right", "-d", "7m", "--notes", "ok"]));
    let events = sandbox.events();
    assert_eq!(events[0]["side"], "right");
    assert_eq!(events[0]["duration_secs"], 420);
    assert_eq!(events[0]["notes"], "ok");

    assert_success(&sandbox.run(&["delete", &id]));
    assert!(sandbox.events().is_empty());

    let output = sandbox.run(&["delete", &id]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("That entry no longer exists"));
}

#[test]
fn test_missing_baby_is_an_error() {
    let sandbox = Sandbox::new();
    std::fs::write(
        &sandbox.config,
        format!("database_path = {:?}\n", sandbox.database().display().to_string()),
    )
    .unwrap();
    let output = sandbox.run(&["log", "diaper"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No baby selected"));
}
