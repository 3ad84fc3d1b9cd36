//! Store-wide reconciliation.
//!
//! Phase one reads every task file on a small pool of reader threads. Phase
//! two works on the collected records: it prunes dependency lists against
//! the statuses the files declare, corrects statuses through the transition
//! engine, and then hands the writes to one writer thread per destination
//! status directory so that no two threads ever move into the same place.
//!
//! A pass is best effort. Bad files are skipped, failed writes are reported
//! per task, and nothing is rolled back. Running it again picks up where the
//! last one stopped.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::{mpsc, Mutex};
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{read_record, write_atomic, TaskEntry, TaskStore};
use crate::task::model::{now_utc, Status, TaskRecord};
use crate::task::render::render;
use crate::task::transition::{self, StatusChange};
use crate::task_id::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyChange {
    /// The dependency is done or cancelled.
    Resolved,
    /// No task with that id exists.
    Missing,
    /// The item is not a quoted task reference.
    Malformed,
}

impl fmt::Display for DependencyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyChange::Resolved => "resolved",
            DependencyChange::Missing => "missing",
            DependencyChange::Malformed => "malformed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMove {
    pub task_id: TaskId,
    pub from: Status,
    pub to: Status,
}

/// One item removed from a task's waiting_on list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyUpdate {
    pub task_id: TaskId,
    pub change: DependencyChange,
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub task_id: TaskId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub transitions: Vec<StatusMove>,
    pub updates: Vec<DependencyUpdate>,
    /// Tasks examined.
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.transitions.is_empty() && self.updates.is_empty()
    }
}

struct Loaded {
    entry: TaskEntry,
    record: TaskRecord,
}

/// A task whose file, location, or both need to change.
struct Job {
    id: TaskId,
    location: Status,
    /// New file contents, if the record changed.
    record: Option<TaskRecord>,
    target: Status,
}

/// Run one full reconciliation pass over `store`.
///
/// The only fatal error is a missing store root.
pub fn sync(store: &TaskStore) -> Result<SyncReport> {
    let scan = store.scan()?;
    let mut report = SyncReport {
        skipped: scan.unreadable,
        ..SyncReport::default()
    };
    let entries = scan.entries;

    let loaded = load_all(entries, store.config().sync.workers, &mut report);
    report.count = loaded.len();

    let declared: HashMap<TaskId, Status> = loaded
        .iter()
        .map(|task| (task.entry.id.clone(), task.record.status))
        .collect();

    let mut jobs = Vec::new();
    for task in loaded {
        if let Some(job) = plan(task, &declared, &mut report) {
            jobs.push(job);
        }
    }

    report.failures.extend(persist(store, jobs));
    if !report.failures.is_empty() {
        let failed: HashSet<TaskId> = report
            .failures
            .iter()
            .map(|failure| failure.task_id.clone())
            .collect();
        report
            .transitions
            .retain(|transition| !failed.contains(&transition.task_id));
    }

    info!(
        count = report.count,
        transitions = report.transitions.len(),
        updates = report.updates.len(),
        skipped = report.skipped.len(),
        failures = report.failures.len(),
        "sync pass complete"
    );
    Ok(report)
}

/// Phase one. Results come back in scan order; the first copy of a
/// duplicated id wins.
fn load_all(entries: Vec<TaskEntry>, workers: usize, report: &mut SyncReport) -> Vec<Loaded> {
    let total = entries.len();
    let queue = Mutex::new(entries.into_iter().enumerate().collect::<VecDeque<_>>());
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers.clamp(1, total.max(1)) {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut queue) => queue.pop_front(),
                    Err(_) => None,
                };
                let Some((index, entry)) = next else {
                    break;
                };
                let result = read_record(&entry.file);
                if tx.send((index, entry, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<_> = rx.into_iter().collect();
    results.sort_by_key(|(index, _, _)| *index);

    let mut seen: HashMap<TaskId, PathBuf> = HashMap::new();
    let mut loaded = Vec::with_capacity(results.len());
    for (_, entry, result) in results {
        if let Some(first) = seen.get(&entry.id) {
            warn!(id = %entry.id, dir = %entry.dir.display(), "duplicate task id, skipping");
            report.skipped.push(SkippedTask {
                path: entry.file,
                reason: format!("duplicate of {}", first.display()),
            });
            continue;
        }
        match result {
            Ok(record) => {
                seen.insert(entry.id.clone(), entry.dir.clone());
                loaded.push(Loaded { entry, record });
            }
            Err(err) => {
                warn!(file = %entry.file.display(), %err, "skipping task");
                report.skipped.push(SkippedTask {
                    path: entry.file,
                    reason: err.to_string(),
                });
            }
        }
    }
    loaded
}

/// Phase two for one task: decide the corrected record and where it belongs.
fn plan(task: Loaded, declared: &HashMap<TaskId, Status>, report: &mut SyncReport) -> Option<Job> {
    let Loaded { entry, record: original } = task;
    let id = entry.id;
    let mut record = original.clone();

    if record.status == Status::Waiting || record.has_waiting_on() {
        let mut kept = Vec::new();
        for item in record.waiting_on.iter().flatten() {
            let change = match TaskId::from_quoted_ref(item) {
                Err(err) => {
                    warn!(%id, item = %item, %err, "dropping malformed dependency");
                    DependencyChange::Malformed
                }
                Ok(dep) => match declared.get(&dep) {
                    None => {
                        warn!(%id, dependency = %dep, "dropping missing dependency");
                        DependencyChange::Missing
                    }
                    Some(status) if status.is_closed() => {
                        debug!(%id, dependency = %dep, %status, "dependency resolved");
                        DependencyChange::Resolved
                    }
                    Some(_) => {
                        kept.push(dep);
                        continue;
                    }
                },
            };
            report.updates.push(DependencyUpdate {
                task_id: id.clone(),
                change,
                dependency: item.clone(),
            });
        }

        record.set_waiting_on(&kept);
        let target = if kept.is_empty() {
            Status::Todo
        } else {
            Status::Waiting
        };
        if record.status != target {
            if let Err(err) =
                transition::apply(&mut record, &StatusChange::new(target), declared, now_utc())
            {
                warn!(%id, %err, "could not correct status");
                report.failures.push(SyncFailure {
                    task_id: id,
                    error: err.to_string(),
                });
                return None;
            }
        }
    }

    let changed = record != original;
    if record.status != original.status {
        report.transitions.push(StatusMove {
            task_id: id.clone(),
            from: original.status,
            to: record.status,
        });
    } else if record.status != entry.location {
        report.transitions.push(StatusMove {
            task_id: id.clone(),
            from: entry.location,
            to: record.status,
        });
    }

    if !changed && record.status == entry.location {
        return None;
    }
    Some(Job {
        id,
        location: entry.location,
        target: record.status,
        record: changed.then_some(record),
    })
}

/// Write and relocate, one thread per destination status directory.
fn persist(store: &TaskStore, jobs: Vec<Job>) -> Vec<SyncFailure> {
    let mut groups: BTreeMap<Status, Vec<Job>> = BTreeMap::new();
    for job in jobs {
        groups.entry(job.target).or_default().push(job);
    }

    thread::scope(|scope| {
        let handles: Vec<_> = groups
            .into_values()
            .map(|group| {
                let ids: Vec<TaskId> = group.iter().map(|job| job.id.clone()).collect();
                (ids, scope.spawn(move || write_group(store, group)))
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|(ids, handle)| group_failures(ids, handle.join()))
            .collect()
    })
}

/// Failures of one writer thread. A thread that panicked fails every task
/// it was handed, since none of its writes can be trusted.
fn group_failures(
    ids: Vec<TaskId>,
    joined: thread::Result<Vec<SyncFailure>>,
) -> Vec<SyncFailure> {
    match joined {
        Ok(failures) => failures,
        Err(_) => {
            warn!(tasks = ids.len(), "sync writer thread panicked");
            ids.into_iter()
                .map(|task_id| SyncFailure {
                    task_id,
                    error: "writer thread panicked".to_string(),
                })
                .collect()
        }
    }
}

fn write_group(store: &TaskStore, group: Vec<Job>) -> Vec<SyncFailure> {
    let mut failures = Vec::new();
    for job in group {
        let written = match &job.record {
            Some(record) => write_atomic(
                &store.task_file(job.location, &job.id),
                render(record).as_bytes(),
            ),
            None => Ok(()),
        };
        let result = written.and_then(|()| store.relocate(&job.id, job.location, job.target));
        if let Err(err) = result {
            warn!(id = %job.id, %err, "sync could not persist task");
            failures.push(SyncFailure {
                task_id: job.id,
                error: err.to_string(),
            });
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::task::model::parse_timestamp;
    use crate::task::parse::parse;
    use std::fs;

    fn store(workers: usize) -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.sync.workers = workers;
        let store = TaskStore::with_config(dir.path(), config).expect("store");
        (dir, store)
    }

    fn put(store: &TaskStore, dir: Status, id: &str, record: &TaskRecord) -> TaskId {
        let id = TaskId::parse(id).expect("id");
        let file = store.task_file(dir, &id);
        fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
        fs::write(&file, render(record)).expect("write");
        id
    }

    fn record(status: Status) -> TaskRecord {
        let created = parse_timestamp("2024-01-01T00:00:00Z").expect("timestamp");
        let mut record = TaskRecord::new("task", "sam", created);
        record.status = status;
        if status.is_closed() {
            record.completed = Some(created);
        }
        record
    }

    fn waiting_on(items: &[&str]) -> TaskRecord {
        let mut record = record(Status::Waiting);
        record.waiting_on = Some(items.iter().map(|item| item.to_string()).collect());
        record
    }

    fn read(store: &TaskStore, dir: Status, id: &TaskId) -> TaskRecord {
        let text = fs::read_to_string(store.task_file(dir, id)).expect("read task");
        parse(&text).expect("parse task")
    }

    #[test]
    fn stale_waiting_task_in_todo_is_corrected_in_place() {
        let (_dir, store) = store(4);
        let task = put(&store, Status::Todo, "abc_def_123", &waiting_on(&["\"[[xyz_geo_456]]\""]));
        put(&store, Status::Done, "xyz_geo_456", &record(Status::Done));

        let report = sync(&store).expect("sync");
        assert_eq!(report.count, 2);
        assert_eq!(
            report.updates,
            vec![DependencyUpdate {
                task_id: task.clone(),
                change: DependencyChange::Resolved,
                dependency: "\"[[xyz_geo_456]]\"".to_string(),
            }]
        );
        assert_eq!(
            report.transitions,
            vec![StatusMove {
                task_id: task.clone(),
                from: Status::Waiting,
                to: Status::Todo,
            }]
        );

        let fixed = read(&store, Status::Todo, &task);
        assert_eq!(fixed.status, Status::Todo);
        assert!(fixed.waiting_on.is_none());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let (_dir, store) = store(2);
        put(&store, Status::Todo, "abc_def_123", &waiting_on(&["\"[[xyz_geo_456]]\""]));
        put(&store, Status::Todo, "xyz_geo_456", &record(Status::Started));
        put(&store, Status::Done, "mno_pqr_789", &record(Status::Todo));
        put(&store, Status::Waiting, "qrs_tuv_abc", &waiting_on(&["\"[[gone_away_zzz]]\""]));

        let first = sync(&store).expect("first");
        assert!(!first.is_clean());
        let second = sync(&store).expect("second");
        assert!(second.is_clean(), "{second:?}");
        assert_eq!(second.count, 4);
    }

    #[test]
    fn misfiled_task_moves_with_its_files() {
        let (_dir, store) = store(1);
        let id = put(&store, Status::Todo, "abc_def_123", &record(Status::Done));
        fs::write(store.task_dir(Status::Todo, &id).join("attachment.png"), [1u8, 2, 3])
            .expect("attachment");

        let report = sync(&store).expect("sync");
        assert_eq!(
            report.transitions,
            vec![StatusMove {
                task_id: id.clone(),
                from: Status::Todo,
                to: Status::Done,
            }]
        );
        assert!(report.updates.is_empty());
        assert!(!store.task_dir(Status::Todo, &id).exists());
        let moved = store.task_dir(Status::Done, &id);
        assert_eq!(
            fs::read(moved.join("attachment.png")).expect("attachment"),
            vec![1u8, 2, 3]
        );
    }

    #[test]
    fn unfinished_dependency_keeps_task_waiting() {
        let (_dir, store) = store(4);
        let id = put(
            &store,
            Status::Todo,
            "abc_def_123",
            &waiting_on(&["\"[[xyz_geo_456]]\"", "\"[[gone_away_zzz]]\"", "[[bad]]"]),
        );
        put(&store, Status::Started, "xyz_geo_456", &record(Status::Started));

        let report = sync(&store).expect("sync");
        let changes: Vec<DependencyChange> = report.updates.iter().map(|u| u.change).collect();
        assert_eq!(
            changes,
            vec![DependencyChange::Missing, DependencyChange::Malformed]
        );
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].from, Status::Todo);
        assert_eq!(report.transitions[0].to, Status::Waiting);

        let fixed = read(&store, Status::Waiting, &id);
        assert_eq!(fixed.waiting_on, Some(vec!["\"[[xyz_geo_456]]\"".to_string()]));
    }

    #[test]
    fn dependency_list_outside_waiting_moves_task_to_waiting() {
        let (_dir, store) = store(4);
        let mut started = record(Status::Started);
        started.waiting_on = Some(vec!["\"[[xyz_geo_456]]\"".to_string()]);
        let id = put(&store, Status::Started, "abc_def_123", &started);
        put(&store, Status::Todo, "xyz_geo_456", &record(Status::Todo));

        let report = sync(&store).expect("sync");
        assert_eq!(
            report.transitions,
            vec![StatusMove {
                task_id: id.clone(),
                from: Status::Started,
                to: Status::Waiting,
            }]
        );
        assert_eq!(read(&store, Status::Waiting, &id).status, Status::Waiting);
    }

    #[test]
    fn unparseable_files_are_skipped() {
        let (_dir, store) = store(3);
        let bad = TaskId::parse("abc_def_123").expect("id");
        let file = store.task_file(Status::Todo, &bad);
        fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
        fs::write(&file, "---\ntitle: broken\n").expect("write");
        put(&store, Status::Todo, "xyz_geo_456", &record(Status::Todo));

        let report = sync(&store).expect("sync");
        assert_eq!(report.count, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("failed to find end of header"));
        assert_eq!(fs::read_to_string(&file).expect("untouched"), "---\ntitle: broken\n");
    }

    #[test]
    fn duplicate_ids_keep_the_first_copy() {
        let (_dir, store) = store(2);
        let id = put(&store, Status::Todo, "abc_def_123", &record(Status::Todo));
        put(&store, Status::Done, "abc_def_123", &record(Status::Done));

        let report = sync(&store).expect("sync");
        assert_eq!(report.count, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.is_clean());
        assert!(store.task_dir(Status::Todo, &id).exists());
    }

    #[test]
    fn blocked_relocation_is_reported_not_fatal() {
        let (_dir, store) = store(2);
        let id = put(&store, Status::Todo, "abc_def_123", &record(Status::Started));
        fs::create_dir_all(store.task_dir(Status::Started, &id)).expect("occupy target");
        put(&store, Status::Done, "xyz_geo_456", &record(Status::Cancelled));

        let report = sync(&store).expect("sync");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].task_id, id);
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].to, Status::Cancelled);
        assert!(store.task_dir(Status::Cancelled, &TaskId::parse("xyz_geo_456").expect("id")).exists());
    }

    #[test]
    fn unreadable_status_directory_is_skipped() {
        let (dir, store) = store(2);
        fs::write(dir.path().join("cancelled"), "not a directory").expect("stray file");
        let id = put(&store, Status::Todo, "abc_def_123", &record(Status::Started));

        let report = sync(&store).expect("sync");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, dir.path().join("cancelled"));
        assert_eq!(
            report.transitions,
            vec![StatusMove {
                task_id: id.clone(),
                from: Status::Todo,
                to: Status::Started,
            }]
        );
        assert!(store.task_dir(Status::Started, &id).exists());
    }

    #[test]
    fn panicked_writer_fails_its_whole_group() {
        let ids = vec![
            TaskId::parse("abc_def_123").expect("id"),
            TaskId::parse("xyz_geo_456").expect("id"),
        ];
        let failures = group_failures(ids.clone(), Err(Box::new("boom")));
        let failed: Vec<TaskId> = failures.iter().map(|f| f.task_id.clone()).collect();
        assert_eq!(failed, ids);

        let none = group_failures(ids, Ok(Vec::new()));
        assert!(none.is_empty());
    }

    #[test]
    fn stray_list_item_line_survives_repeated_syncs() {
        let (_dir, store) = store(2);
        let mut stray = waiting_on(&["\"[[xyz_geo_456]]\""]);
        stray.status = Status::Todo;
        stray.extensions = vec!["- stray note".to_string()];
        let id = put(&store, Status::Todo, "abc_def_123", &stray);
        put(&store, Status::Started, "xyz_geo_456", &record(Status::Started));

        let first = sync(&store).expect("first");
        assert_eq!(first.transitions.len(), 1);
        let moved = read(&store, Status::Waiting, &id);
        assert_eq!(moved.extensions, vec!["- stray note".to_string()]);
        assert_eq!(moved.waiting_on, Some(vec!["\"[[xyz_geo_456]]\"".to_string()]));

        let second = sync(&store).expect("second");
        assert!(second.is_clean(), "{second:?}");
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("store");
        fs::create_dir(&root).expect("mkdir");
        let store = TaskStore::open(&root).expect("open");
        fs::remove_dir(&root).expect("rmdir");
        assert!(matches!(
            sync(&store).expect_err("gone"),
            crate::error::Error::StoreNotFound(_)
        ));
    }
}
