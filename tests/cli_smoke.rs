mod support;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use support::TestStore;

#[test]
fn taskdir_help_works() {
    Command::cargo_bin("taskdir")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("task tracker"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "new", "show", "update", "find", "sync", "check", "serve",
    ];

    for cmd in subcommands {
        support::taskdir_cmd()
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn init_is_idempotent() {
    let store = TestStore::empty();
    let first = store.json(&["init"]);
    assert_eq!(first["schema_version"], "taskdir.v1");
    assert_eq!(first["data"]["created"]["config"], true);
    assert!(store.path().join(".taskdir.toml").is_file());

    let second = store.json(&["init"]);
    assert_eq!(second["data"]["created"]["config"], false);
}

#[test]
fn new_then_show_round_trips_fields() {
    let store = TestStore::init();
    let id = store.new_task(&[
        "Write release notes",
        "--priority",
        "high",
        "--priority-value",
        "7",
        "--tag",
        "docs",
        "--body",
        "Cover the sync changes.",
    ]);

    let shown = store.json(&["show", &id]);
    let record = &shown["data"]["record"];
    assert_eq!(shown["data"]["location"], "todo");
    assert_eq!(record["title"], "Write release notes");
    assert_eq!(record["priority"], "high");
    assert_eq!(record["priority_value"], 7);
    assert_eq!(record["owner"], "unassigned");
    assert_eq!(record["tags"][0], "docs");

    let text = store.read_task("todo", &id);
    assert!(text.starts_with("---\ntitle: Write release notes\nstatus: todo\n"));
    assert!(text.ends_with("---\nCover the sync changes.\n"));
}

#[test]
fn owner_flag_and_env_set_the_owner() {
    let store = TestStore::init();
    let by_flag = store.new_task(&["flagged", "--owner", "kim"]);
    let shown = store.json(&["show", &by_flag]);
    assert_eq!(shown["data"]["record"]["owner"], "kim");

    let output = store
        .cmd()
        .env("TASKDIR_OWNER", "lee")
        .args(["--json", "new", "from env"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json");
    let id = value["data"]["id"].as_str().expect("id").to_string();
    let shown = store.json(&["show", &id]);
    assert_eq!(shown["data"]["record"]["owner"], "lee");
}

#[test]
fn show_accepts_reference_forms() {
    let store = TestStore::init();
    let id = store.new_task(&["referenced"]);
    let inline = format!("[[{id}]]");
    let shown = store.json(&["show", &inline]);
    assert_eq!(shown["data"]["id"], id.as_str());
}

#[test]
fn missing_store_is_a_user_error() {
    let store = TestStore::empty();
    let missing = store.path().join("nope");
    let output = support::taskdir_cmd()
        .arg("--root")
        .arg(&missing)
        .args(["--json", "find"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["kind"], "store_not_found");
    assert_eq!(value["error"]["code"], 2);
}

#[test]
fn unknown_and_malformed_ids_are_user_errors() {
    let store = TestStore::init();
    store
        .cmd()
        .args(["show", "abc_def_123"])
        .assert()
        .code(2)
        .stderr(contains("Task not found"));

    let output = store
        .cmd()
        .args(["--json", "show", "not-an-id"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(value["error"]["kind"], "invalid_task_id");
}

#[test]
fn waiting_on_requires_status() {
    let store = TestStore::init();
    let id = store.new_task(&["blocked"]);
    store
        .cmd()
        .args(["update", id.as_str(), "--waiting-on", "abc_def_123"])
        .assert()
        .code(2);
}

#[test]
fn empty_update_is_rejected() {
    let store = TestStore::init();
    let id = store.new_task(&["idle"]);
    store
        .cmd()
        .args(["update", id.as_str()])
        .assert()
        .code(2)
        .stderr(contains("nothing to update"));
}
