//! Status changes and the completed / waiting_on bookkeeping that goes with
//! them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{Status, TaskRecord};
use crate::task_id::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task should be waiting: {0}")]
    ShouldBeWaiting(String),

    #[error("task is done; move it back to todo before cancelling it")]
    ShouldBeDone,

    #[error("task is cancelled; move it back to todo before marking it done")]
    ShouldBeCancelled,
}

impl TransitionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::ShouldBeWaiting(_) => "should_be_waiting",
            TransitionError::ShouldBeDone => "should_be_done",
            TransitionError::ShouldBeCancelled => "should_be_cancelled",
        }
    }
}

/// Requested target status, plus dependencies to add when the target is
/// `waiting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub to: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waiting_on: Vec<TaskId>,
}

impl StatusChange {
    pub fn new(to: Status) -> Self {
        Self {
            to,
            waiting_on: Vec::new(),
        }
    }

    pub fn with_waiting_on(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.waiting_on.extend(ids);
        self
    }
}

/// Where the engine learns the current status of a dependency.
pub trait DependencyLookup {
    /// `None` when the task cannot be found.
    fn status_of(&self, id: &TaskId) -> Option<Status>;
}

impl DependencyLookup for HashMap<TaskId, Status> {
    fn status_of(&self, id: &TaskId) -> Option<Status> {
        self.get(id).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: Status,
    pub to: Status,
    /// Dependencies discarded because they were all finished.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub released: Vec<TaskId>,
}

/// Apply `change` to `record`. On error the record is left untouched.
pub fn apply(
    record: &mut TaskRecord,
    change: &StatusChange,
    deps: &impl DependencyLookup,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionError> {
    let from = record.status;
    let to = change.to;

    if !change.waiting_on.is_empty() && to != Status::Waiting {
        return Err(TransitionError::ShouldBeWaiting(format!(
            "dependencies can only be added when moving to waiting, not {to}"
        )));
    }
    match (from, to) {
        (Status::Done, Status::Cancelled) => return Err(TransitionError::ShouldBeDone),
        (Status::Cancelled, Status::Done) => return Err(TransitionError::ShouldBeCancelled),
        _ => {}
    }

    let mut next = record.clone();
    let mut released = Vec::new();

    if to == Status::Waiting {
        let items = next.waiting_on.get_or_insert_with(Vec::new);
        for id in &change.waiting_on {
            let quoted = id.quoted_ref();
            if !items.contains(&quoted) {
                items.push(quoted);
            }
        }
        if items.is_empty() {
            return Err(TransitionError::ShouldBeWaiting(
                "waiting requires at least one dependency".to_string(),
            ));
        }
        next.completed = None;
    } else {
        if let Some(items) = next.waiting_on.take() {
            let pending = unfinished(&items, deps);
            if !pending.is_empty() {
                return Err(TransitionError::ShouldBeWaiting(format!(
                    "unfinished dependencies: {}",
                    pending.join(", ")
                )));
            }
            released = items
                .iter()
                .filter_map(|item| TaskId::from_quoted_ref(item).ok())
                .collect();
        }
        if to.is_closed() {
            next.completed.get_or_insert(now);
        } else {
            next.completed = None;
        }
    }

    next.status = to;
    *record = next;
    Ok(TransitionOutcome { from, to, released })
}

/// Items that do not point at a done or cancelled task. Malformed and
/// unknown references count as unfinished.
fn unfinished(items: &[String], deps: &impl DependencyLookup) -> Vec<String> {
    items
        .iter()
        .filter(|item| {
            !TaskId::from_quoted_ref(item)
                .ok()
                .and_then(|id| deps.status_of(&id))
                .is_some_and(Status::is_closed)
        })
        .cloned()
        .collect()
}
