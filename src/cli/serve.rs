//! taskdir serve command implementation
//!
//! Stdout carries the response stream, so nothing else is printed here.

use std::io;
use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::rpc::serve;
use crate::store::TaskStore;

pub fn run(root: PathBuf) -> Result<()> {
    let store = TaskStore::open(root)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = serve(&store, stdin.lock(), stdout.lock())?;
    info!(
        requests = summary.requests,
        errors = summary.errors,
        shutdown = summary.shutdown,
        "serve loop finished"
    );
    Ok(())
}
