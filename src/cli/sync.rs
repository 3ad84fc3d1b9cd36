//! taskdir sync command implementation

use std::path::PathBuf;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::TaskStore;
use crate::sync::{sync, SyncReport};

pub fn run(root: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let store = TaskStore::open(root)?;
    let report = sync(&store)?;
    let human = sync_human(&report);
    emit_success(OutputOptions { json, quiet }, "sync", &report, Some(&human))
}

pub(super) fn sync_human(report: &SyncReport) -> HumanOutput {
    let header = if report.is_clean() {
        "taskdir sync: store already consistent"
    } else {
        "taskdir sync: store reconciled"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("tasks", report.count.to_string());
    human.push_summary("transitions", report.transitions.len().to_string());
    human.push_summary("dependency updates", report.updates.len().to_string());

    for transition in &report.transitions {
        human.push_detail(format!(
            "{}: {} -> {}",
            transition.task_id, transition.from, transition.to
        ));
    }
    for update in &report.updates {
        human.push_detail(format!(
            "{}: dropped {} dependency {}",
            update.task_id, update.change, update.dependency
        ));
    }
    add_warnings(&mut human, report);
    human
}

/// Skipped files and failed writes, as human warnings.
pub(super) fn add_warnings(human: &mut HumanOutput, report: &SyncReport) {
    for skipped in &report.skipped {
        human.push_warning(format!("skipped {}: {}", skipped.path.display(), skipped.reason));
    }
    for failure in &report.failures {
        human.push_warning(format!("{}: {}", failure.task_id, failure.error));
    }
}
