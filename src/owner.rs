//! Owner identity for new tasks.
//!
//! Resolution order:
//! 1) CLI --owner (explicit)
//! 2) TASKDIR_OWNER environment variable
//! 3) Config default (defaults.owner) or "unassigned"

use std::path::Path;

use crate::config::Config;

pub const OWNER_ENV: &str = "TASKDIR_OWNER";

/// Resolve the owner using CLI, environment, and config.
pub fn resolve_owner(root: Option<&Path>, cli_owner: Option<&str>) -> String {
    if let Some(owner) = non_empty(cli_owner) {
        return owner.to_string();
    }

    if let Ok(env_owner) = std::env::var(OWNER_ENV) {
        if let Some(owner) = non_empty(Some(env_owner.as_str())) {
            return owner.to_string();
        }
    }

    match root {
        Some(root) => Config::load_from_root(root).defaults.owner,
        None => Config::default().defaults.owner,
    }
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
