//! On-disk task store.
//!
//! Layout: `<root>/<status>/<id>/<id>.md`. The file is the source of truth;
//! its directory is where the task was last filed and may lag behind the
//! declared status until the next sync. Status directories are created on
//! first use. Anything else inside a task directory belongs to the user and
//! travels with the task when it is relocated.

use std::cmp::Reverse;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{Config, CONFIG_FILENAME};
use crate::error::{Error, Result};
use crate::sync::{SkippedTask, SyncReport};
use crate::task::model::{now_utc, Priority, Status, TaskRecord};
use crate::task::parse::parse;
use crate::task::render::render;
use crate::task::transition::{self, DependencyLookup, StatusChange, TransitionOutcome};
use crate::task::validate::validate;
use crate::task_id::{TaskId, TaskIdGenerator};

/// Outcome of [`TaskStore::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub entries: Vec<TaskEntry>,
    /// Status directories or entries that could not be listed.
    pub unreadable: Vec<SkippedTask>,
}

/// A task directory found by [`TaskStore::scan`], not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: TaskId,
    /// Status directory the task currently sits in.
    pub location: Status,
    pub dir: PathBuf,
    pub file: PathBuf,
}

/// A parsed task together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredTask {
    pub id: TaskId,
    pub location: Status,
    pub dir: PathBuf,
    pub record: TaskRecord,
}

/// Input for [`TaskStore::create`]. Unset fields fall back to config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub title: String,
    pub owner: Option<String>,
    pub priority: Option<Priority>,
    pub priority_value: Option<u8>,
    pub status: Option<Status>,
    pub waiting_on: Vec<TaskId>,
    pub tags: Vec<String>,
    pub body: Option<String>,
}

/// Field edits for [`TaskStore::update`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub owner: Option<String>,
    pub priority: Option<Priority>,
    pub priority_value: Option<u8>,
    /// Replacement tag list; an empty list removes the field.
    pub tags: Option<Vec<String>>,
    pub body: Option<String>,
    pub status: Option<StatusChange>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.owner.is_none()
            && self.priority.is_none()
            && self.priority_value.is_none()
            && self.tags.is_none()
            && self.body.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub task: StoredTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionOutcome>,
    /// False when the edits left the file byte-identical.
    pub changed: bool,
}

/// Query for [`TaskStore::find`]. Empty filter matches every task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskFilter {
    pub status: Vec<Status>,
    pub owner: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title.
    pub text: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, record: &TaskRecord) -> bool {
        if !self.status.is_empty() && !self.status.contains(&record.status) {
            return false;
        }
        if let Some(owner) = &self.owner {
            if record.owner != *owner {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !record.has_tag(tag) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if record.priority != priority {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !record.title.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FindResult {
    pub tasks: Vec<StoredTask>,
    /// Present when the store was reconciled before the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
    config: Config,
}

impl TaskStore {
    /// Open an existing store, reading `.taskdir.toml` if present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::StoreNotFound(root));
        }
        let config = Config::load_from_root(&root);
        Ok(Self { root, config })
    }

    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::StoreNotFound(root));
        }
        config.validate()?;
        Ok(Self { root, config })
    }

    /// Create the root and a default config file, keeping any existing one.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| Error::io(&root, err))?;
        let config_path = root.join(CONFIG_FILENAME);
        if config_path.exists() {
            let config = Config::load(&config_path)?;
            return Ok(Self { root, config });
        }
        let config = Config::default();
        config.save(&config_path)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status_dir(&self, status: Status) -> PathBuf {
        self.root.join(status.as_str())
    }

    pub fn task_dir(&self, status: Status, id: &TaskId) -> PathBuf {
        self.status_dir(status).join(id.as_str())
    }

    pub fn task_file(&self, status: Status, id: &TaskId) -> PathBuf {
        self.task_dir(status, id).join(format!("{id}.md"))
    }

    /// Status directory currently holding `id`, first match in walk order.
    pub fn locate(&self, id: &TaskId) -> Option<Status> {
        Status::ALL
            .into_iter()
            .find(|status| self.task_file(*status, id).is_file())
    }

    pub fn get(&self, id: &TaskId) -> Result<StoredTask> {
        let location = self
            .locate(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let record = read_record(&self.task_file(location, id))?;
        Ok(StoredTask {
            id: id.clone(),
            location,
            dir: self.task_dir(location, id),
            record,
        })
    }

    /// Every task directory, status directories in [`Status::ALL`] order and
    /// ids sorted within each. Entries that are not named like a task id are
    /// ignored. A status directory or entry that cannot be read is logged,
    /// recorded in [`Scan::unreadable`] and passed over; only a missing root
    /// is an error.
    pub fn scan(&self) -> Result<Scan> {
        if !self.root.is_dir() {
            return Err(Error::StoreNotFound(self.root.clone()));
        }
        let mut scan = Scan::default();
        for status in Status::ALL {
            let dir = self.status_dir(status);
            let read = match fs::read_dir(&dir) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "cannot read status directory");
                    scan.unreadable.push(SkippedTask {
                        path: dir,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let mut ids = Vec::new();
            for entry in read {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(dir = %dir.display(), %err, "cannot read directory entry");
                        scan.unreadable.push(SkippedTask {
                            path: dir.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };
                if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                    continue;
                }
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                match TaskId::parse(name) {
                    Ok(id) => ids.push(id),
                    Err(err) => debug!(dir = %dir.display(), %err, "ignoring non-task directory"),
                }
            }
            ids.sort();
            scan.entries.extend(ids.into_iter().map(|id| TaskEntry {
                dir: self.task_dir(status, &id),
                file: self.task_file(status, &id),
                location: status,
                id,
            }));
        }
        Ok(scan)
    }

    /// Every parseable task. Unreadable files are logged and left out; the
    /// first copy of a duplicated id wins.
    pub fn list(&self) -> Result<Vec<StoredTask>> {
        let mut seen = std::collections::HashSet::new();
        let mut tasks = Vec::new();
        for entry in self.scan()?.entries {
            if seen.contains(&entry.id) {
                warn!(id = %entry.id, dir = %entry.dir.display(), "duplicate task id, ignoring copy");
                continue;
            }
            match read_record(&entry.file) {
                Ok(record) => {
                    seen.insert(entry.id.clone());
                    tasks.push(StoredTask {
                        id: entry.id,
                        location: entry.location,
                        dir: entry.dir,
                        record,
                    });
                }
                Err(err) => warn!(file = %entry.file.display(), %err, "skipping unreadable task"),
            }
        }
        Ok(tasks)
    }

    /// Create a task under a fresh id. Ids that already exist anywhere in the
    /// store are retried, up to `ids.max_attempts` times.
    pub fn create(&self, ids: &mut TaskIdGenerator, new: NewTask) -> Result<StoredTask> {
        let defaults = &self.config.defaults;
        let owner = new.owner.unwrap_or_else(|| defaults.owner.clone());
        let mut record = TaskRecord::new(new.title.trim(), owner.trim(), now_utc());
        record.priority = new.priority.unwrap_or(defaults.priority);
        record.priority_value = new.priority_value.unwrap_or(defaults.priority_value);
        record.set_tags(new.tags);
        if let Some(body) = &new.body {
            record.set_body(body);
        }

        let target = match new.status {
            Some(status) => status,
            None if !new.waiting_on.is_empty() => Status::Waiting,
            None => defaults.status,
        };
        if target != record.status || !new.waiting_on.is_empty() {
            let change = StatusChange::new(target).with_waiting_on(new.waiting_on);
            let created = record.created;
            transition::apply(&mut record, &change, self, created)?;
        }
        validate(&record)?;

        let status_dir = self.status_dir(record.status);
        fs::create_dir_all(&status_dir).map_err(|err| Error::io(&status_dir, err))?;

        let attempts = self.config.ids.max_attempts;
        let mut last = None;
        for attempt in 1..=attempts {
            let id = ids.generate();
            if let Some(existing) = self.locate(&id) {
                debug!(%id, %existing, attempt, "task id collision");
                last = Some(id);
                continue;
            }
            let dir = self.task_dir(record.status, &id);
            match fs::create_dir(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(%id, attempt, "task directory collision");
                    last = Some(id);
                    continue;
                }
                Err(err) => return Err(Error::io(&dir, err)),
            }

            let file = self.task_file(record.status, &id);
            if let Err(err) = write_atomic(&file, render(&record).as_bytes()) {
                let _ = fs::remove_dir_all(&dir);
                return Err(err);
            }
            debug!(%id, status = %record.status, "created task");
            return Ok(StoredTask {
                id,
                location: record.status,
                dir,
                record,
            });
        }

        Err(Error::TaskExists(format!(
            "{} (no free id after {attempts} attempts)",
            last.map(|id| id.to_string()).unwrap_or_default()
        )))
    }

    /// Apply field edits and an optional status change, then persist and
    /// refile the task. The file is not rewritten when nothing changed.
    pub fn update(&self, id: &TaskId, update: TaskUpdate) -> Result<UpdateOutcome> {
        let stored = self.get(id)?;
        let mut record = stored.record.clone();

        if let Some(title) = update.title {
            record.title = title.trim().to_string();
        }
        if let Some(owner) = update.owner {
            record.owner = owner.trim().to_string();
        }
        if let Some(priority) = update.priority {
            record.priority = priority;
        }
        if let Some(priority_value) = update.priority_value {
            record.priority_value = priority_value;
        }
        if let Some(tags) = update.tags {
            record.set_tags(tags);
        }
        if let Some(body) = update.body {
            record.set_body(&body);
        }

        let transition = match &update.status {
            Some(change) => Some(transition::apply(&mut record, change, self, now_utc())?),
            None => None,
        };

        if let Err(err) = validate(&record) {
            if !err.is_correctable() {
                return Err(err.into());
            }
            warn!(%id, %err, "dependency list disagrees with status; sync will correct it");
        }

        let changed = record != stored.record;
        if changed {
            write_atomic(&self.task_file(stored.location, id), render(&record).as_bytes())?;
        }
        let dir = if record.status != stored.location {
            self.relocate(id, stored.location, record.status)?
        } else {
            stored.dir
        };

        Ok(UpdateOutcome {
            task: StoredTask {
                id: id.clone(),
                location: record.status,
                dir,
                record,
            },
            transition,
            changed,
        })
    }

    /// Matching tasks, most urgent first. Reconciles the store beforehand
    /// when `sync.auto` is set.
    pub fn find(&self, filter: &TaskFilter) -> Result<FindResult> {
        let sync = if self.config.sync.auto {
            Some(crate::sync::sync(self)?)
        } else {
            None
        };

        let mut tasks: Vec<StoredTask> = self
            .list()?
            .into_iter()
            .filter(|task| filter.matches(&task.record))
            .collect();
        sort_tasks(&mut tasks);
        Ok(FindResult { tasks, sync })
    }

    /// Move a whole task directory between status directories.
    pub fn relocate(&self, id: &TaskId, from: Status, to: Status) -> Result<PathBuf> {
        let source = self.task_dir(from, id);
        if from == to {
            return Ok(source);
        }
        let status_dir = self.status_dir(to);
        fs::create_dir_all(&status_dir).map_err(|err| Error::io(&status_dir, err))?;
        let target = self.task_dir(to, id);
        if target.exists() {
            return Err(Error::TaskExists(format!(
                "{id} already present in {}",
                status_dir.display()
            )));
        }
        fs::rename(&source, &target).map_err(|err| Error::io(&source, err))?;
        debug!(%id, %from, %to, "relocated task");
        Ok(target)
    }
}

impl DependencyLookup for TaskStore {
    fn status_of(&self, id: &TaskId) -> Option<Status> {
        let location = self.locate(id)?;
        match read_record(&self.task_file(location, id)) {
            Ok(record) => Some(record.status),
            Err(err) => {
                debug!(%id, %err, "dependency unreadable");
                None
            }
        }
    }
}

/// Status, then priority and priority_value descending, then oldest first.
pub fn sort_tasks(tasks: &mut [StoredTask]) {
    tasks.sort_by(|left, right| {
        let (l, r) = (&left.record, &right.record);
        l.status
            .cmp(&r.status)
            .then_with(|| Reverse(l.priority).cmp(&Reverse(r.priority)))
            .then_with(|| Reverse(l.priority_value).cmp(&Reverse(r.priority_value)))
            .then_with(|| l.created.cmp(&r.created))
            .then_with(|| left.id.cmp(&right.id))
    });
}

pub fn read_record(path: &Path) -> Result<TaskRecord> {
    let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    parse(&text).map_err(|diagnostic| Error::parse(path, diagnostic))
}

/// Write via a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidArgument(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|err| Error::io(parent, err))?;
    temp.write_all(data).map_err(|err| Error::io(temp.path(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| Error::io(temp.path(), err))?;
    temp.persist(path).map_err(|err| Error::io(path, err.error))?;
    Ok(())
}
