//! Command-line interface for taskdir
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::{Error, Result};
use crate::task::model::{Priority, Status};

mod init;
mod serve;
mod sync;
mod task;

/// taskdir - plain-text task tracker
///
/// One markdown file per task, one directory per status.
#[derive(Parser, Debug)]
#[command(name = "taskdir")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the task store (defaults to current directory)
    #[arg(long, global = true, env = "TASKDIR_ROOT")]
    pub root: Option<PathBuf>,

    /// Owner for new tasks
    #[arg(long, global = true, env = "TASKDIR_OWNER")]
    pub owner: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a task store with a default .taskdir.toml
    Init,

    /// Create a new task
    New {
        /// Task title
        title: String,

        /// Priority: low, medium, high, urgent
        #[arg(long)]
        priority: Option<Priority>,

        /// Tie-breaker within a priority (0-255, higher first)
        #[arg(long)]
        priority_value: Option<u8>,

        /// Initial status: todo, started, waiting, done, cancelled
        #[arg(long)]
        status: Option<Status>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Task this one waits on (repeatable; implies --status waiting)
        #[arg(long = "waiting-on")]
        waiting_on: Vec<String>,

        /// Description body
        #[arg(long)]
        body: Option<String>,
    },

    /// Show one task
    Show {
        /// Task id (bare, [[id]] or "[[id]]")
        id: String,
    },

    /// Edit fields or change the status of a task
    Update {
        /// Task id (bare, [[id]] or "[[id]]")
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New owner
        #[arg(long)]
        assignee: Option<String>,

        /// New priority
        #[arg(long)]
        priority: Option<Priority>,

        /// New priority value (0-255)
        #[arg(long)]
        priority_value: Option<u8>,

        /// Replace tags (repeatable)
        #[arg(long = "tag", conflicts_with = "clear_tags")]
        tags: Vec<String>,

        /// Remove all tags
        #[arg(long)]
        clear_tags: bool,

        /// Replace the description body
        #[arg(long)]
        body: Option<String>,

        /// Move to this status
        #[arg(long)]
        status: Option<Status>,

        /// Dependency to add when moving to waiting (repeatable)
        #[arg(long = "waiting-on", requires = "status")]
        waiting_on: Vec<String>,
    },

    /// List tasks, most urgent first
    Find {
        /// Only these statuses (repeatable)
        #[arg(long)]
        status: Vec<Status>,

        /// Only tasks owned by this name
        #[arg(long)]
        assignee: Option<String>,

        /// Only tasks carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only this priority
        #[arg(long)]
        priority: Option<Priority>,

        /// Case-insensitive title substring
        #[arg(long)]
        text: Option<String>,

        /// Skip the automatic sync before listing
        #[arg(long)]
        no_sync: bool,
    },

    /// Reconcile dependency lists and status directories
    Sync,

    /// Validate every task file
    Check,

    /// Answer line-delimited JSON requests on stdin/stdout
    Serve,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let root = resolve_root(self.root)?;
        match self.command {
            Commands::Init => init::run(root, self.json, self.quiet),
            Commands::New {
                title,
                priority,
                priority_value,
                status,
                tags,
                waiting_on,
                body,
            } => task::run_new(task::NewOptions {
                title,
                priority,
                priority_value,
                status,
                tags,
                waiting_on,
                body,
                owner: self.owner,
                root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Show { id } => task::run_show(task::ShowOptions {
                id,
                root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Update {
                id,
                title,
                assignee,
                priority,
                priority_value,
                tags,
                clear_tags,
                body,
                status,
                waiting_on,
            } => task::run_update(task::UpdateOptions {
                id,
                title,
                assignee,
                priority,
                priority_value,
                tags,
                clear_tags,
                body,
                status,
                waiting_on,
                root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Find {
                status,
                assignee,
                tag,
                priority,
                text,
                no_sync,
            } => task::run_find(task::FindOptions {
                status,
                assignee,
                tag,
                priority,
                text,
                no_sync,
                root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Sync => sync::run(root, self.json, self.quiet),
            Commands::Check => task::run_check(root, self.json, self.quiet),
            Commands::Serve => serve::run(root),
        }
    }
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => std::env::current_dir().map_err(|err| Error::io(".", err)),
    }
}
