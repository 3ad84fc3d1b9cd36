mod support;

use std::fs;

use taskdir::config::Config;
use taskdir::task::{Priority, Status};

use support::TestStore;

#[test]
fn load_from_root_defaults_on_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(".taskdir.toml"), "defaults = 123").expect("write invalid config");

    let cfg = Config::load_from_root(dir.path());
    assert_eq!(cfg.defaults.owner, "unassigned");
    assert_eq!(cfg.defaults.priority, Priority::Medium);
    assert_eq!(cfg.defaults.status, Status::Todo);
}

#[test]
fn init_writes_a_loadable_default_config() {
    let store = TestStore::init();
    let cfg = Config::load(&store.path().join(".taskdir.toml")).expect("load");
    assert_eq!(cfg, Config::default());
}

#[test]
fn new_tasks_take_defaults_from_config() {
    let store = TestStore::init();
    store.write_config(
        r#"
[defaults]
owner = "ops"
priority = "high"
priority_value = 5
"#,
    );

    let id = store.new_task(&["configured"]);
    let shown = store.json(&["show", &id]);
    let record = &shown["data"]["record"];
    assert_eq!(record["owner"], "ops");
    assert_eq!(record["priority"], "high");
    assert_eq!(record["priority_value"], 5);
}

#[test]
fn auto_sync_can_be_disabled() {
    let store = TestStore::init();
    store.write_config("[sync]\nauto = false\n");
    store.write_task(
        "todo",
        "abc_def_123",
        &support::task_text("misfiled", "started", &[]),
    );

    let found = store.json(&["find"]);
    assert!(found["data"]["sync"].is_null());
    assert!(store.task_file("todo", "abc_def_123").is_file());

    store.json(&["sync"]);
    assert!(store.task_file("started", "abc_def_123").is_file());
}
