//! In-memory shape of one task file.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::normalize_value;
use crate::task_id::TaskId;

/// On-disk timestamp layout. Always UTC, always whole seconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Rejected enumeration literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} '{value}' (expected one of: {expected})")]
pub struct UnknownSymbol {
    pub field: &'static str,
    pub value: String,
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Todo,
    Started,
    Waiting,
    Done,
    Cancelled,
}

impl Status {
    /// Every status, in the order status directories are walked.
    pub const ALL: [Status; 5] = [
        Status::Todo,
        Status::Started,
        Status::Waiting,
        Status::Done,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Started => "started",
            Status::Waiting => "waiting",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }

    /// Done and cancelled tasks carry a completed timestamp.
    pub fn is_closed(self) -> bool {
        matches!(self, Status::Done | Status::Cancelled)
    }

    pub fn symbols() -> Vec<&'static str> {
        Self::ALL.iter().map(|status| status.as_str()).collect()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownSymbol {
                field: "status",
                value: s.to_string(),
                expected: Self::symbols().join(", "),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn symbols() -> Vec<&'static str> {
        Self::ALL.iter().map(|priority| priority.as_str()).collect()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| UnknownSymbol {
                field: "priority",
                value: s.to_string(),
                expected: Self::symbols().join(", "),
            })
    }
}

/// One task, as read from (or about to be written to) its markdown file.
///
/// `waiting_on` keeps the raw quoted items so that malformed references can
/// be reported by the validator instead of vanishing at parse time.
/// `extensions` holds header lines that matched no known field, in file
/// order and without their line terminators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub priority_value: u8,
    pub owner: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_on: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

impl TaskRecord {
    /// A fresh `todo` record with an empty body.
    pub fn new(title: impl Into<String>, owner: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            status: Status::Todo,
            priority: Priority::Medium,
            priority_value: 0,
            owner: owner.into(),
            created,
            completed: None,
            waiting_on: None,
            tags: None,
            description: "\n".to_string(),
            extensions: Vec::new(),
        }
    }

    /// Description text without the line break that ends the closing `---`.
    pub fn body(&self) -> &str {
        self.description
            .strip_prefix("\r\n")
            .or_else(|| self.description.strip_prefix('\n'))
            .unwrap_or(&self.description)
    }

    pub fn set_body(&mut self, body: &str) {
        self.description = format!("\n{body}");
    }

    pub fn has_waiting_on(&self) -> bool {
        self.waiting_on
            .as_ref()
            .is_some_and(|items| !items.is_empty())
    }

    /// Well-formed dependency ids, in list order. Malformed items are skipped.
    pub fn waiting_refs(&self) -> Vec<TaskId> {
        self.waiting_on
            .iter()
            .flatten()
            .filter_map(|item| TaskId::from_quoted_ref(item).ok())
            .collect()
    }

    /// Replace the dependency list; an empty list clears the field.
    pub fn set_waiting_on(&mut self, ids: &[TaskId]) {
        self.waiting_on = if ids.is_empty() {
            None
        } else {
            Some(ids.iter().map(TaskId::quoted_ref).collect())
        };
    }

    /// Replace the tag list; an empty list clears the field. Tags are
    /// stored in the form they read back as.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = if tags.is_empty() {
            None
        } else {
            Some(
                tags.iter()
                    .map(|tag| normalize_value(tag).to_string())
                    .collect(),
            )
        };
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().flatten().any(|candidate| candidate == tag)
    }
}

/// Current time truncated to the precision the file format can hold.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` exactly; any other shape is rejected.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let bytes = value.as_bytes();
    if bytes.len() != 20 {
        return None;
    }
    let shape_ok = bytes.iter().enumerate().all(|(index, byte)| match index {
        4 | 7 => *byte == b'-',
        10 => *byte == b'T',
        13 | 16 => *byte == b':',
        19 => *byte == b'Z',
        _ => byte.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_symbols_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().expect("parse"), status);
        }
        let err = "Done".parse::<Status>().expect_err("case sensitive");
        assert!(err.to_string().contains("todo, started, waiting, done, cancelled"));
    }

    #[test]
    fn priority_symbols_round_trip() {
        for priority in Priority::ALL {
            assert_eq!(
                priority.as_str().parse::<Priority>().expect("parse"),
                priority
            );
        }
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn timestamps_require_exact_shape() {
        let parsed = parse_timestamp("2024-03-09T07:05:00Z").expect("valid");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).single().expect("date")
        );
        assert_eq!(format_timestamp(&parsed), "2024-03-09T07:05:00Z");

        for bad in [
            "2024-3-09T07:05:00Z",
            "2024-03-09 07:05:00Z",
            "2024-03-09T07:05:00",
            "2024-03-09T07:05:00+00:00",
            "2024-13-09T07:05:00Z",
            "2024-03-09T07:05:00.5Z",
        ] {
            assert!(parse_timestamp(bad).is_none(), "{bad} should be rejected");
        }
    }

    #[test]
    fn body_strips_leading_line_break_only() {
        let mut record = TaskRecord::new("t", "o", now_utc());
        record.set_body("hello\n");
        assert_eq!(record.description, "\nhello\n");
        assert_eq!(record.body(), "hello\n");

        record.description = "\r\n\nx".to_string();
        assert_eq!(record.body(), "\nx");
    }

    #[test]
    fn waiting_refs_skip_malformed_items() {
        let mut record = TaskRecord::new("t", "o", now_utc());
        record.waiting_on = Some(vec![
            "\"[[abc_def_123]]\"".to_string(),
            "abc_def_456".to_string(),
        ]);
        let refs = record.waiting_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].as_str(), "abc_def_123");

        record.set_waiting_on(&[]);
        assert!(record.waiting_on.is_none());
        assert!(!record.has_waiting_on());
    }
}
