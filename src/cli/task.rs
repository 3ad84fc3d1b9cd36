//! Task command implementations: new, show, update, find, check.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::owner::resolve_owner;
use crate::store::{read_record, NewTask, StoredTask, TaskFilter, TaskStore, TaskUpdate};
use crate::task::model::{format_timestamp, Priority, Status};
use crate::task::transition::StatusChange;
use crate::task::validate::violations;
use crate::task_id::{TaskId, TaskIdGenerator};

pub struct NewOptions {
    pub title: String,
    pub priority: Option<Priority>,
    pub priority_value: Option<u8>,
    pub status: Option<Status>,
    pub tags: Vec<String>,
    pub waiting_on: Vec<String>,
    pub body: Option<String>,
    pub owner: Option<String>,
    pub root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
    pub priority_value: Option<u8>,
    pub tags: Vec<String>,
    pub clear_tags: bool,
    pub body: Option<String>,
    pub status: Option<Status>,
    pub waiting_on: Vec<String>,
    pub root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

pub struct FindOptions {
    pub status: Vec<Status>,
    pub assignee: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub text: Option<String>,
    pub no_sync: bool,
    pub root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskCreatedOutput {
    id: TaskId,
    status: Status,
    priority: Priority,
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
struct CheckProblem {
    path: PathBuf,
    code: String,
    message: String,
    correctable: bool,
}

#[derive(Serialize)]
struct CheckReport {
    checked: usize,
    problems: Vec<CheckProblem>,
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let store = TaskStore::open(options.root)?;
    let title = options.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }

    let owner = resolve_owner(Some(store.root()), options.owner.as_deref());
    let waiting_on = parse_ids(&options.waiting_on)?;
    let mut ids = TaskIdGenerator::new();
    let task = store.create(
        &mut ids,
        NewTask {
            title: title.to_string(),
            owner: Some(owner),
            priority: options.priority,
            priority_value: options.priority_value,
            status: options.status,
            waiting_on,
            tags: options.tags,
            body: options.body.map(terminate_line),
        },
    )?;

    let output = TaskCreatedOutput {
        id: task.id.clone(),
        status: task.record.status,
        priority: task.record.priority,
        path: store.task_file(task.location, &task.id),
    };

    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", task.id.to_string());
    human.push_summary("Status", task.record.status.to_string());
    human.push_summary("Priority", task.record.priority.to_string());
    human.push_summary("Owner", task.record.owner.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "new",
        &output,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let store = TaskStore::open(options.root)?;
    let id = TaskId::from_any_form(&options.id)?;
    let task = store.get(&id)?;
    let human = task_human(&task);
    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "show",
        &task,
        Some(&human),
    )
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let store = TaskStore::open(options.root)?;
    let id = TaskId::from_any_form(&options.id)?;

    let tags = if options.clear_tags {
        Some(Vec::new())
    } else if options.tags.is_empty() {
        None
    } else {
        Some(options.tags)
    };
    let status = match options.status {
        Some(to) => Some(StatusChange::new(to).with_waiting_on(parse_ids(&options.waiting_on)?)),
        None => None,
    };
    let update = TaskUpdate {
        title: options.title,
        owner: options.assignee,
        priority: options.priority,
        priority_value: options.priority_value,
        tags,
        body: options.body.map(terminate_line),
        status,
    };
    if update.is_empty() {
        return Err(Error::InvalidArgument("nothing to update".to_string()));
    }

    let outcome = store.update(&id, update)?;

    let header = if outcome.changed {
        "Task updated"
    } else {
        "Task unchanged"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("ID", id.to_string());
    if let Some(transition) = &outcome.transition {
        human.push_summary("Status", format!("{} -> {}", transition.from, transition.to));
        for released in &transition.released {
            human.push_detail(format!("released dependency {released}"));
        }
    } else {
        human.push_summary("Status", outcome.task.record.status.to_string());
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "update",
        &outcome,
        Some(&human),
    )
}

pub fn run_find(options: FindOptions) -> Result<()> {
    let mut store = TaskStore::open(&options.root)?;
    if options.no_sync && store.config().sync.auto {
        let mut config = store.config().clone();
        config.sync.auto = false;
        store = TaskStore::with_config(&options.root, config)?;
    }

    let filter = TaskFilter {
        status: options.status,
        owner: options.assignee,
        tag: options.tag,
        priority: options.priority,
        text: options.text,
    };
    let result = store.find(&filter)?;

    let mut human = HumanOutput::new(format!("{} task(s)", result.tasks.len()));
    for task in &result.tasks {
        human.push_detail(format!(
            "{} [{}] {} ({}/{}, {})",
            task.id,
            task.record.status,
            task.record.title,
            task.record.priority,
            task.record.priority_value,
            task.record.owner
        ));
    }
    if let Some(report) = &result.sync {
        if !report.is_clean() {
            human.push_summary(
                "sync",
                format!(
                    "{} transition(s), {} dependency update(s)",
                    report.transitions.len(),
                    report.updates.len()
                ),
            );
        }
        super::sync::add_warnings(&mut human, report);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "find",
        &result,
        Some(&human),
    )
}

/// Parse and validate every task file without changing anything.
pub fn run_check(root: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let store = TaskStore::open(root)?;
    let scan = store.scan()?;
    let mut problems: Vec<CheckProblem> = scan
        .unreadable
        .iter()
        .map(|skipped| CheckProblem {
            path: skipped.path.clone(),
            code: "unreadable".to_string(),
            message: skipped.reason.clone(),
            correctable: false,
        })
        .collect();

    for entry in &scan.entries {
        let record = match read_record(&entry.file) {
            Ok(record) => record,
            Err(err) => {
                problems.push(CheckProblem {
                    path: entry.file.clone(),
                    code: err.kind().to_string(),
                    message: err.to_string(),
                    correctable: false,
                });
                continue;
            }
        };
        for violation in violations(&record) {
            problems.push(CheckProblem {
                path: entry.file.clone(),
                code: violation.code().to_string(),
                message: violation.to_string(),
                correctable: violation.is_correctable(),
            });
        }
        if record.status != entry.location {
            problems.push(CheckProblem {
                path: entry.file.clone(),
                code: "misfiled".to_string(),
                message: format!(
                    "declares {} but is filed under {}",
                    record.status, entry.location
                ),
                correctable: true,
            });
        }
    }

    let failing = problems.iter().filter(|problem| !problem.correctable).count();
    let report = CheckReport {
        checked: scan.entries.len(),
        problems,
    };

    let mut human = HumanOutput::new(if failing == 0 {
        "taskdir check: ok"
    } else {
        "taskdir check: problems found"
    });
    human.push_summary("checked", report.checked.to_string());
    human.push_summary("failing", failing.to_string());
    for problem in &report.problems {
        let line = format!("{}: {}", problem.path.display(), problem.message);
        if problem.correctable {
            human.push_warning(line);
        } else {
            human.push_detail(line);
        }
    }
    if report.problems.iter().any(|problem| problem.correctable) {
        human.push_next_step("taskdir sync");
    }

    if failing == 0 {
        return emit_success(OutputOptions { json, quiet }, "check", &report, Some(&human));
    }

    if !json && !quiet {
        println!("{}", crate::output::format_human(&human));
    }
    Err(Error::CheckFailed {
        count: failing,
        problems: serde_json::to_value(&report.problems)?,
    })
}

fn task_human(task: &StoredTask) -> HumanOutput {
    let record = &task.record;
    let mut human = HumanOutput::new(format!("{} {}", task.id, record.title));

    let status = if record.status == task.location {
        record.status.to_string()
    } else {
        format!("{} (filed under {})", record.status, task.location)
    };
    human.push_summary("Status", status);
    human.push_summary(
        "Priority",
        format!("{} ({})", record.priority, record.priority_value),
    );
    human.push_summary("Owner", record.owner.clone());
    human.push_summary("Created", format_timestamp(&record.created));
    if let Some(completed) = &record.completed {
        human.push_summary("Completed", format_timestamp(completed));
    }
    if let Some(items) = &record.waiting_on {
        human.push_summary("Waiting on", items.join(", "));
    }
    if let Some(tags) = &record.tags {
        human.push_summary("Tags", tags.join(", "));
    }
    for line in record.body().lines().filter(|line| !line.trim().is_empty()) {
        human.push_detail(line.to_string());
    }
    human
}

fn terminate_line(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn parse_ids(values: &[String]) -> Result<Vec<TaskId>> {
    values
        .iter()
        .map(|value| TaskId::from_any_form(value).map_err(Error::from))
        .collect()
}
