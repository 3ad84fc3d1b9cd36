#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub const CREATED: &str = "2024-01-01T00:00:00Z";

pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    /// Empty directory, not yet initialized.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Directory initialized through `taskdir init`.
    pub fn init() -> Self {
        let store = Self::empty();
        store.cmd().arg("init").assert().success();
        store
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn task_file(&self, status: &str, id: &str) -> PathBuf {
        self.path().join(status).join(id).join(format!("{id}.md"))
    }

    pub fn write_task(&self, status: &str, id: &str, contents: &str) -> PathBuf {
        let path = self.task_file(status, id);
        fs::create_dir_all(path.parent().expect("task dir")).expect("create task dir");
        fs::write(&path, contents).expect("write task file");
        path
    }

    pub fn read_task(&self, status: &str, id: &str) -> String {
        fs::read_to_string(self.task_file(status, id)).expect("read task file")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.path().join(".taskdir.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    /// `taskdir --root <store>` with ambient owner settings cleared.
    pub fn cmd(&self) -> Command {
        let mut cmd = taskdir_cmd();
        cmd.arg("--root").arg(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// Create a task through the CLI and return its id.
    pub fn new_task(&self, args: &[&str]) -> String {
        let mut full = vec!["new"];
        full.extend_from_slice(args);
        let value = self.json(&full);
        value["data"]["id"].as_str().expect("task id").to_string()
    }
}

pub fn taskdir_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskdir").expect("binary");
    cmd.env_remove("TASKDIR_OWNER")
        .env_remove("TASKDIR_ROOT")
        .env_remove("RUST_LOG");
    cmd
}

/// Header text for a hand-written task file.
pub fn task_text(title: &str, status: &str, extra: &[&str]) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("title: {title}"),
        format!("status: {status}"),
        "priority: medium".to_string(),
        "priority_value: 0".to_string(),
        "owner: sam".to_string(),
        format!("created: {CREATED}"),
    ];
    if matches!(status, "done" | "cancelled") {
        lines.push(format!("completed: {CREATED}"));
    }
    lines.extend(extra.iter().map(|line| line.to_string()));
    lines.push("---".to_string());
    lines.push(String::new());
    lines.join("\n")
}
