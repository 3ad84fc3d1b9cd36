//! Line-delimited JSON request loop.
//!
//! One request object per input line, one response object per output line:
//!
//! ```text
//! {"op":"get","id":"abc_def_123"}
//! {"ok":{"id":"abc_def_123","location":"todo",...}}
//! {"op":"nope"}
//! {"err":{"code":4,"kind":"parse_error","message":"..."}}
//! ```
//!
//! A line that does not decode gets a `parse_error` response and the loop
//! keeps going. `shutdown` is acknowledged and ends the loop.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{exit_codes, Error, Result};
use crate::store::{NewTask, TaskFilter, TaskStore, TaskUpdate};
use crate::task_id::{TaskId, TaskIdGenerator};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Create {
        task: NewTask,
    },
    Get {
        id: String,
    },
    Update {
        id: String,
        #[serde(default)]
        update: TaskUpdate,
    },
    Find {
        #[serde(default)]
        filter: TaskFilter,
    },
    Sync,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorPayload {
    fn from(err: &Error) -> Self {
        Self {
            code: err.exit_code(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ok { ok: serde_json::Value },
    Err { err: ErrorPayload },
}

impl Response {
    pub fn ok(payload: serde_json::Value) -> Self {
        Response::Ok { ok: payload }
    }

    pub fn err(error: impl Into<ErrorPayload>) -> Self {
        Response::Err { err: error.into() }
    }

    fn parse_error(message: impl Into<String>) -> Self {
        Response::Err {
            err: ErrorPayload {
                code: exit_codes::OPERATION_FAILED,
                kind: "parse_error".to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServeSummary {
    pub requests: usize,
    pub errors: usize,
    pub shutdown: bool,
}

/// Answer requests from `reader` until shutdown or end of input.
pub fn serve<R: BufRead, W: Write>(store: &TaskStore, reader: R, mut writer: W) -> Result<ServeSummary> {
    let mut ids = TaskIdGenerator::new();
    let mut summary = ServeSummary::default();

    for line in reader.lines() {
        let line = line.map_err(|err| Error::io("<stdin>", err))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.requests += 1;

        let (response, shutdown) = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!(?request, "rpc request");
                let shutdown = matches!(request, Request::Shutdown);
                let response = match handle(store, &mut ids, request) {
                    Ok(payload) => Response::ok(payload),
                    Err(err) => Response::err(&err),
                };
                (response, shutdown)
            }
            Err(err) => (Response::parse_error(err.to_string()), false),
        };
        if matches!(response, Response::Err { .. }) {
            summary.errors += 1;
        }

        let encoded = serde_json::to_string(&response)?;
        writeln!(writer, "{encoded}")
            .and_then(|()| writer.flush())
            .map_err(|err| Error::io("<stdout>", err))?;

        if shutdown {
            summary.shutdown = true;
            break;
        }
    }

    Ok(summary)
}

fn handle(store: &TaskStore, ids: &mut TaskIdGenerator, request: Request) -> Result<serde_json::Value> {
    let value = match request {
        Request::Create { task } => serde_json::to_value(store.create(ids, task)?)?,
        Request::Get { id } => serde_json::to_value(store.get(&TaskId::from_any_form(&id)?)?)?,
        Request::Update { id, update } => {
            let id = TaskId::from_any_form(&id)?;
            serde_json::to_value(store.update(&id, update)?)?
        }
        Request::Find { filter } => serde_json::to_value(store.find(&filter)?)?,
        Request::Sync => serde_json::to_value(crate::sync::sync(store)?)?,
        Request::Shutdown => serde_json::json!({ "shutdown": true }),
    };
    Ok(value)
}
