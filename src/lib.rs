//! taskdir - plain-text task tracker
//!
//! Each task is a markdown file with a small header, stored under a
//! directory named after its status:
//!
//! ```text
//! <root>/<status>/<task_id>/<task_id>.md
//! ```
//!
//! # Module Organization
//!
//! - `task_id`: identifier validation, reference forms and generation
//! - `task`: record model, header parser and renderer, validation, status transitions
//! - `store`: directory layout, create/update/find over task files
//! - `sync`: reconcile waiting-on lists and directory placement
//! - `rpc`: line-delimited JSON request loop
//! - `config`: `.taskdir.toml` loading
//! - `owner`: default owner resolution
//! - `output`: human and JSON rendering for the CLI
//! - `cli`: command-line interface using clap
//! - `error`: error types and exit codes

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod owner;
pub mod rpc;
pub mod store;
pub mod sync;
pub mod task;
pub mod task_id;

pub use error::{Error, Result};
