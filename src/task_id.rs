//! Task identifiers.
//!
//! Ids look like `word_word_ccc`: two lowercase words followed by a three
//! character suffix drawn from a 32 symbol alphabet that leaves out the
//! easily confused `i`, `l`, `o` and `u`.
//!
//! Three text forms exist:
//! - bare (`amble_dax_7kq`) for paths and arguments
//! - inline (`[[amble_dax_7kq]]`) inside description prose
//! - quoted (`"[[amble_dax_7kq]]"`), the only legal shape in `waiting_on`

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbols allowed in the three character suffix.
pub const SUFFIX_ALPHABET: &str = "0123456789abcdefghjkmnpqrstvwxyz";

const SUFFIX_LEN: usize = 3;

// 32 onsets x 32 rimes = 1024 first words (10 bits).
const FIRST_ONSETS: [&str; 32] = [
    "b", "bl", "br", "c", "ch", "cl", "cr", "d", "dr", "f", "fl", "fr", "g", "gl", "gr", "h", "j",
    "k", "l", "m", "n", "p", "pl", "pr", "r", "s", "sh", "sl", "st", "t", "tr", "v",
];
const FIRST_RIMES: [&str; 32] = [
    "ace", "ack", "ale", "amp", "and", "ane", "ank", "ark", "ash", "ast", "ate", "ave", "eak",
    "eam", "eed", "ell", "end", "est", "ick", "ide", "ill", "ine", "ing", "ink", "ist", "oak",
    "ock", "ode", "one", "ook", "ope", "ump",
];

// 16 onsets x 8 rimes = 128 second words (7 bits).
const SECOND_ONSETS: [&str; 16] = [
    "b", "d", "f", "g", "h", "k", "l", "m", "n", "p", "r", "s", "t", "v", "w", "z",
];
const SECOND_RIMES: [&str; 8] = ["ale", "ax", "ear", "ell", "ind", "oon", "ose", "ush"];

/// Number of distinct first words.
pub const FIRST_WORD_COUNT: usize = FIRST_ONSETS.len() * FIRST_RIMES.len();

/// Number of distinct second words.
pub const SECOND_WORD_COUNT: usize = SECOND_ONSETS.len() * SECOND_RIMES.len();

/// Structural rejection of a candidate id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task id '{candidate}': {reason}")]
pub struct InvalidTaskId {
    pub candidate: String,
    pub reason: String,
}

impl InvalidTaskId {
    fn new(candidate: &str, reason: impl Into<String>) -> Self {
        Self {
            candidate: candidate.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check the shape of a candidate id without touching the store.
pub fn validate(candidate: &str) -> Result<(), InvalidTaskId> {
    if !candidate.is_ascii() {
        return Err(InvalidTaskId::new(candidate, "must be ASCII"));
    }

    let underscores = candidate.matches('_').count();
    if underscores != 2 {
        return Err(InvalidTaskId::new(
            candidate,
            format!("expected exactly two underscores, found {underscores}"),
        ));
    }

    let len = candidate.len();
    if len < SUFFIX_LEN + 1 || candidate.rfind('_') != Some(len - SUFFIX_LEN - 1) {
        return Err(InvalidTaskId::new(
            candidate,
            "final underscore must come exactly 3 characters before the end",
        ));
    }

    let (head, tail) = candidate.split_at(len - SUFFIX_LEN - 1);
    let suffix = &tail[1..];
    if let Some(bad) = suffix.chars().find(|ch| !SUFFIX_ALPHABET.contains(*ch)) {
        return Err(InvalidTaskId::new(
            candidate,
            format!("suffix character '{bad}' is not in {SUFFIX_ALPHABET}"),
        ));
    }

    if let Some(bad) = head
        .chars()
        .find(|ch| !ch.is_ascii_alphabetic() && *ch != '_')
    {
        return Err(InvalidTaskId::new(
            candidate,
            format!("word character '{bad}' is not alphabetic"),
        ));
    }

    if head.split('_').any(str::is_empty) {
        return Err(InvalidTaskId::new(candidate, "both words must be non-empty"));
    }

    Ok(())
}

/// A structurally valid task id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    pub fn parse(candidate: &str) -> Result<Self, InvalidTaskId> {
        let trimmed = candidate.trim();
        validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Parse the `"[[taskid]]"` form used by `waiting_on` items.
    pub fn from_quoted_ref(item: &str) -> Result<Self, InvalidTaskId> {
        let inner = item
            .strip_prefix("\"[[")
            .and_then(|rest| rest.strip_suffix("]]\""))
            .ok_or_else(|| InvalidTaskId::new(item, "expected \"[[taskid]]\""))?;
        validate(inner)?;
        Ok(Self(inner.to_string()))
    }

    /// Parse either the bare, inline or quoted form.
    pub fn from_any_form(input: &str) -> Result<Self, InvalidTaskId> {
        let trimmed = input.trim();
        if trimmed.starts_with('"') {
            return Self::from_quoted_ref(trimmed);
        }
        let bare = trimmed
            .strip_prefix("[[")
            .and_then(|rest| rest.strip_suffix("]]"))
            .unwrap_or(trimmed);
        Self::parse(bare)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `[[taskid]]`
    pub fn inline_ref(&self) -> String {
        format!("[[{}]]", self.0)
    }

    /// `"[[taskid]]"`
    pub fn quoted_ref(&self) -> String {
        format!("\"[[{}]]\"", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = InvalidTaskId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = InvalidTaskId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Source of fresh task ids.
///
/// Constructed once by the caller and passed to whatever needs new ids. The
/// generator reseeds itself from the clock on every call, so two processes
/// started in the same instant still drift apart quickly. Uniqueness is not
/// guaranteed: callers must retry when the destination path already exists.
#[derive(Debug)]
pub struct TaskIdGenerator {
    rng: StdRng,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(time_entropy()),
        }
    }

    pub fn generate(&mut self) -> TaskId {
        self.reseed();
        let first = self.rng.random_range(0..FIRST_WORD_COUNT);
        let second = self.rng.random_range(0..SECOND_WORD_COUNT);
        let alphabet = SUFFIX_ALPHABET.as_bytes();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| alphabet[self.rng.random_range(0..alphabet.len())] as char)
            .collect();

        TaskId(format!(
            "{}_{}_{}",
            first_word(first),
            second_word(second),
            suffix
        ))
    }

    fn reseed(&mut self) {
        let mixed = self.rng.next_u64() ^ time_entropy();
        self.rng = StdRng::seed_from_u64(mixed);
    }
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn first_word(index: usize) -> String {
    let onset = FIRST_ONSETS[index / FIRST_RIMES.len()];
    let rime = FIRST_RIMES[index % FIRST_RIMES.len()];
    format!("{onset}{rime}")
}

fn second_word(index: usize) -> String {
    let onset = SECOND_ONSETS[index / SECOND_RIMES.len()];
    let rime = SECOND_RIMES[index % SECOND_RIMES.len()];
    format!("{onset}{rime}")
}

fn time_entropy() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
