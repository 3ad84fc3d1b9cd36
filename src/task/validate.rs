//! Whole-record invariant checks, independent of any transition.

use thiserror::Error;

use super::model::{Status, TaskRecord};
use super::schema::{is_reserved_line, is_trimmed};
use crate::task_id::TaskId;

/// One violated record invariant.
///
/// `WaitingFoundButAllValid` is the only correctable variant: the dependency
/// list is well formed but the status disagrees with it. Sync repairs it;
/// everything else is a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is empty")]
    EmptyTitle,

    #[error("title contains a line break")]
    TitleLineBreak,

    #[error("title has leading or trailing whitespace")]
    PaddedTitle,

    #[error("owner is empty")]
    EmptyOwner,

    #[error("owner contains a line break")]
    OwnerLineBreak,

    #[error("owner has leading or trailing whitespace")]
    PaddedOwner,

    #[error("tags is present but has no items")]
    EmptyTagList,

    #[error("tag #{index} is empty")]
    EmptyTag { index: usize },

    #[error("tag #{index} contains a line break")]
    TagLineBreak { index: usize },

    #[error("tag #{index} has leading or trailing whitespace")]
    PaddedTag { index: usize },

    #[error("waiting_on is present but has no items")]
    EmptyWaitingOn,

    #[error("waiting_on item '{item}' is malformed: {reason}")]
    MalformedWaitingOn { item: String, reason: String },

    #[error("status is waiting but waiting_on is absent")]
    WaitingWithoutWaitingOn,

    #[error("status is {status} but completed is absent")]
    MissingCompleted { status: Status },

    #[error("status is {status} but completed is set")]
    UnexpectedCompleted { status: Status },

    #[error("extension line '{line}' would be read back as a field or delimiter")]
    MalformedExtension { line: String },

    #[error("status is {status} but waiting_on lists {count} valid reference(s)")]
    WaitingFoundButAllValid { status: Status, count: usize },
}

impl ValidationError {
    pub fn is_correctable(&self) -> bool {
        matches!(self, ValidationError::WaitingFoundButAllValid { .. })
    }

    /// Stable identifier for JSON and RPC consumers.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyTitle => "empty_title",
            ValidationError::TitleLineBreak => "title_line_break",
            ValidationError::PaddedTitle => "padded_title",
            ValidationError::EmptyOwner => "empty_owner",
            ValidationError::OwnerLineBreak => "owner_line_break",
            ValidationError::PaddedOwner => "padded_owner",
            ValidationError::EmptyTagList => "empty_tag_list",
            ValidationError::EmptyTag { .. } => "empty_tag",
            ValidationError::TagLineBreak { .. } => "tag_line_break",
            ValidationError::PaddedTag { .. } => "padded_tag",
            ValidationError::EmptyWaitingOn => "empty_waiting_on",
            ValidationError::MalformedWaitingOn { .. } => "malformed_waiting_on",
            ValidationError::WaitingWithoutWaitingOn => "waiting_without_waiting_on",
            ValidationError::MissingCompleted { .. } => "missing_completed",
            ValidationError::UnexpectedCompleted { .. } => "unexpected_completed",
            ValidationError::MalformedExtension { .. } => "malformed_extension",
            ValidationError::WaitingFoundButAllValid { .. } => "waiting_found_but_all_valid",
        }
    }
}

/// First violated invariant, if any. The correctable mismatch is only
/// reported when nothing else is wrong.
pub fn validate(record: &TaskRecord) -> Result<(), ValidationError> {
    match violations(record).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Every violated invariant, hard rejections first.
pub fn violations(record: &TaskRecord) -> Vec<ValidationError> {
    let mut found = Vec::new();

    if record.title.trim().is_empty() {
        found.push(ValidationError::EmptyTitle);
    } else if has_line_break(&record.title) {
        found.push(ValidationError::TitleLineBreak);
    } else if !is_trimmed(&record.title) {
        found.push(ValidationError::PaddedTitle);
    }

    if record.owner.trim().is_empty() {
        found.push(ValidationError::EmptyOwner);
    } else if has_line_break(&record.owner) {
        found.push(ValidationError::OwnerLineBreak);
    } else if !is_trimmed(&record.owner) {
        found.push(ValidationError::PaddedOwner);
    }

    if let Some(tags) = &record.tags {
        if tags.is_empty() {
            found.push(ValidationError::EmptyTagList);
        }
        for (position, tag) in tags.iter().enumerate() {
            let index = position + 1;
            if tag.trim().is_empty() {
                found.push(ValidationError::EmptyTag { index });
            } else if has_line_break(tag) {
                found.push(ValidationError::TagLineBreak { index });
            } else if !is_trimmed(tag) {
                found.push(ValidationError::PaddedTag { index });
            }
        }
    }

    let mut valid_refs = 0;
    if let Some(items) = &record.waiting_on {
        if items.is_empty() {
            found.push(ValidationError::EmptyWaitingOn);
        }
        for item in items {
            match TaskId::from_quoted_ref(item) {
                Ok(_) => valid_refs += 1,
                Err(err) => found.push(ValidationError::MalformedWaitingOn {
                    item: item.clone(),
                    reason: err.reason,
                }),
            }
        }
    }

    if record.status == Status::Waiting && record.waiting_on.is_none() {
        found.push(ValidationError::WaitingWithoutWaitingOn);
    }

    match (record.status.is_closed(), record.completed.is_some()) {
        (true, false) => found.push(ValidationError::MissingCompleted {
            status: record.status,
        }),
        (false, true) => found.push(ValidationError::UnexpectedCompleted {
            status: record.status,
        }),
        _ => {}
    }

    for line in &record.extensions {
        if has_line_break(line) || is_reserved_line(line) {
            found.push(ValidationError::MalformedExtension { line: line.clone() });
        }
    }

    let list_is_clean = record
        .waiting_on
        .as_ref()
        .is_some_and(|items| !items.is_empty() && valid_refs == items.len());
    if found.is_empty() && record.status != Status::Waiting && list_is_clean {
        found.push(ValidationError::WaitingFoundButAllValid {
            status: record.status,
            count: valid_refs,
        });
    }

    found
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::now_utc;

    fn record() -> TaskRecord {
        TaskRecord::new("Title", "owner", now_utc())
    }

    #[test]
    fn fresh_record_is_valid() {
        assert_eq!(validate(&record()), Ok(()));
    }

    #[test]
    fn rejects_bad_text_fields() {
        let mut r = record();
        r.title = String::new();
        assert_eq!(validate(&r), Err(ValidationError::EmptyTitle));

        r.title = "two\nlines".to_string();
        assert_eq!(validate(&r), Err(ValidationError::TitleLineBreak));

        let mut r = record();
        r.owner = "  ".to_string();
        assert_eq!(validate(&r), Err(ValidationError::EmptyOwner));

        r.owner = "a\rb".to_string();
        assert_eq!(validate(&r), Err(ValidationError::OwnerLineBreak));
    }

    #[test]
    fn rejects_bad_tags() {
        let mut r = record();
        r.tags = Some(Vec::new());
        assert_eq!(validate(&r), Err(ValidationError::EmptyTagList));

        r.tags = Some(vec!["ok".to_string(), String::new()]);
        assert_eq!(validate(&r), Err(ValidationError::EmptyTag { index: 2 }));

        r.tags = Some(vec!["a\nb".to_string()]);
        assert_eq!(validate(&r), Err(ValidationError::TagLineBreak { index: 1 }));
    }

    #[test]
    fn rejects_values_that_read_back_differently() {
        let mut r = record();
        r.title = " padded title".to_string();
        assert_eq!(validate(&r), Err(ValidationError::PaddedTitle));

        let mut r = record();
        r.owner = "owner\t".to_string();
        assert_eq!(validate(&r), Err(ValidationError::PaddedOwner));

        let mut r = record();
        r.tags = Some(vec!["ok".to_string(), " a ".to_string()]);
        let err = validate(&r).expect_err("padded tag");
        assert_eq!(err, ValidationError::PaddedTag { index: 2 });
        assert_eq!(err.code(), "padded_tag");
        assert!(!err.is_correctable());
    }

    #[test]
    fn rejects_malformed_waiting_on_item() {
        let mut r = record();
        r.status = Status::Waiting;
        r.waiting_on = Some(vec!["[[abc_def_123]]".to_string()]);
        let err = validate(&r).expect_err("unquoted");
        assert_eq!(err.code(), "malformed_waiting_on");
        assert!(!err.is_correctable());
    }

    #[test]
    fn status_and_completed_must_agree() {
        let mut r = record();
        r.status = Status::Done;
        assert_eq!(
            validate(&r),
            Err(ValidationError::MissingCompleted {
                status: Status::Done
            })
        );

        r.status = Status::Cancelled;
        r.completed = Some(now_utc());
        assert_eq!(validate(&r), Ok(()));

        r.status = Status::Started;
        assert_eq!(
            validate(&r),
            Err(ValidationError::UnexpectedCompleted {
                status: Status::Started
            })
        );
    }

    #[test]
    fn waiting_requires_waiting_on() {
        let mut r = record();
        r.status = Status::Waiting;
        assert_eq!(validate(&r), Err(ValidationError::WaitingWithoutWaitingOn));

        r.waiting_on = Some(vec!["\"[[abc_def_123]]\"".to_string()]);
        assert_eq!(validate(&r), Ok(()));
    }

    #[test]
    fn valid_list_outside_waiting_is_correctable() {
        let mut r = record();
        r.waiting_on = Some(vec!["\"[[abc_def_123]]\"".to_string()]);
        let err = validate(&r).expect_err("mismatch");
        assert!(err.is_correctable());
        assert_eq!(
            err,
            ValidationError::WaitingFoundButAllValid {
                status: Status::Todo,
                count: 1
            }
        );
    }

    #[test]
    fn hard_errors_hide_the_correctable_case() {
        let mut r = record();
        r.title = String::new();
        r.waiting_on = Some(vec!["\"[[abc_def_123]]\"".to_string()]);
        let all = violations(&r);
        assert_eq!(all, vec![ValidationError::EmptyTitle]);
    }

    #[test]
    fn extension_lines_must_not_shadow_fields() {
        let mut r = record();
        r.extensions = vec!["estimate: 1d".to_string()];
        assert_eq!(validate(&r), Ok(()));

        r.extensions = vec!["owner: someone".to_string()];
        assert_eq!(validate(&r).expect_err("shadow").code(), "malformed_extension");

        r.extensions = vec!["---".to_string()];
        assert!(validate(&r).is_err());

        r.extensions = vec!["- stray".to_string()];
        assert_eq!(validate(&r), Ok(()));
    }
}
