//! taskdir init command implementation
//!
//! Creates the store root and a default `.taskdir.toml`.

use std::path::PathBuf;

use crate::config::CONFIG_FILENAME;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::TaskStore;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    root: bool,
    config: bool,
}

pub fn run(root: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let created_root = !root.is_dir();
    let created_config = !root.join(CONFIG_FILENAME).exists();
    let store = TaskStore::init(&root)?;

    let report = InitReport {
        root: store.root().to_path_buf(),
        created: InitCreated {
            root: created_root,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_root {
        created_items.push(format!("{}/", root.display()));
    }
    if created_config {
        created_items.push(CONFIG_FILENAME.to_string());
    }

    let header = if created_items.is_empty() {
        "taskdir init: nothing to do"
    } else {
        "taskdir init: initialized store"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", store.root().display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("taskdir new \"<title>\"");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}
