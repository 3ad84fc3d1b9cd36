//! Task file text -> [`TaskRecord`].
//!
//! The header is a `---` delimited block of `field: value` lines. List
//! fields put nothing after the colon and list their items on the following
//! `- item` lines. Unknown header lines are kept verbatim as extensions.
//! Everything after the closing delimiter, starting with that line's own
//! terminator, is the description and is copied untouched.
//!
//! Parsing stops at the first problem and reports it as a [`Diagnostic`].

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::{parse_timestamp, Priority, Status, TaskRecord};
use super::schema::{
    match_field, normalize_value, Field, FieldKind, FieldMatch, DELIMITER, LIST_ITEM_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    MissingOpenDelimiter,
    UnterminatedHeader,
    MissingField,
    DuplicateField,
    EmptyValue,
    InvalidEnum,
    InvalidInteger,
    InvalidTimestamp,
    InlineListValue,
    EmptyList,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::MissingOpenDelimiter => "missing_open_delimiter",
            DiagnosticKind::UnterminatedHeader => "unterminated_header",
            DiagnosticKind::MissingField => "missing_field",
            DiagnosticKind::DuplicateField => "duplicate_field",
            DiagnosticKind::EmptyValue => "empty_value",
            DiagnosticKind::InvalidEnum => "invalid_enum",
            DiagnosticKind::InvalidInteger => "invalid_integer",
            DiagnosticKind::InvalidTimestamp => "invalid_timestamp",
            DiagnosticKind::InlineListValue => "inline_list_value",
            DiagnosticKind::EmptyList => "empty_list",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location and description of the first parse failure.
///
/// Lines and columns are 1-based; columns count bytes and `column_end` is
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, columns {column_start}-{column_end}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: usize,
    pub column_start: usize,
    pub column_end: usize,
    pub message: String,
}

impl Diagnostic {
    fn new(
        kind: DiagnosticKind,
        line: usize,
        columns: (usize, usize),
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            column_start: columns.0,
            column_end: columns.1,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    text: &'a str,
    /// Byte offset just past `text`, i.e. where its terminator starts.
    text_end: usize,
}

struct LineCursor<'a> {
    input: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> LineCursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            number: 0,
        }
    }

    fn peek(&self) -> Option<Line<'a>> {
        self.read_at(self.offset, self.number).map(|(line, _)| line)
    }

    fn next_line(&mut self) -> Option<Line<'a>> {
        let (line, next_offset) = self.read_at(self.offset, self.number)?;
        self.offset = next_offset;
        self.number = line.number;
        Some(line)
    }

    fn read_at(&self, offset: usize, number: usize) -> Option<(Line<'a>, usize)> {
        if offset >= self.input.len() {
            return None;
        }
        let rest = &self.input[offset..];
        let (raw, consumed) = match rest.find('\n') {
            Some(index) => (&rest[..index], index + 1),
            None => (rest, rest.len()),
        };
        let text = raw.strip_suffix('\r').unwrap_or(raw);
        Some((
            Line {
                number: number + 1,
                text,
                text_end: offset + text.len(),
            },
            offset + consumed,
        ))
    }
}

#[derive(Debug, Default)]
struct Draft {
    seen: [Option<usize>; Field::ALL.len()],
    title: Option<String>,
    status: Option<Status>,
    priority: Option<Priority>,
    priority_value: Option<u8>,
    owner: Option<String>,
    created: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    waiting_on: Option<Vec<String>>,
    tags: Option<Vec<String>>,
}

/// Parse a whole task file.
pub fn parse(input: &str) -> Result<TaskRecord, Diagnostic> {
    let mut cursor = LineCursor::new(input);

    match cursor.next_line() {
        Some(line) if line.text == DELIMITER => {}
        Some(line) => {
            return Err(Diagnostic::new(
                DiagnosticKind::MissingOpenDelimiter,
                line.number,
                (1, line.text.len().max(1) + 1),
                format!("expected opening `{DELIMITER}`"),
            ));
        }
        None => {
            return Err(Diagnostic::new(
                DiagnosticKind::MissingOpenDelimiter,
                1,
                (1, 1),
                format!("empty input, expected opening `{DELIMITER}`"),
            ));
        }
    }

    let mut draft = Draft::default();
    let mut extensions = Vec::new();
    let mut closing: Option<Line<'_>> = None;
    let mut last_line = 1;

    while let Some(line) = cursor.next_line() {
        last_line = line.number;
        if line.text == DELIMITER {
            closing = Some(line);
            break;
        }
        match match_field(line.text) {
            Some(found) => read_field(&mut draft, &mut cursor, line, found)?,
            None => extensions.push(line.text.to_string()),
        }
    }

    let Some(closing) = closing else {
        return Err(Diagnostic::new(
            DiagnosticKind::UnterminatedHeader,
            last_line,
            (1, 1),
            "failed to find end of header",
        ));
    };

    let missing = |field: Field| {
        Diagnostic::new(
            DiagnosticKind::MissingField,
            closing.number,
            (1, DELIMITER.len() + 1),
            format!("missing required field `{}`", field.name()),
        )
    };

    Ok(TaskRecord {
        title: draft.title.ok_or_else(|| missing(Field::Title))?,
        status: draft.status.ok_or_else(|| missing(Field::Status))?,
        priority: draft.priority.ok_or_else(|| missing(Field::Priority))?,
        priority_value: draft
            .priority_value
            .ok_or_else(|| missing(Field::PriorityValue))?,
        owner: draft.owner.ok_or_else(|| missing(Field::Owner))?,
        created: draft.created.ok_or_else(|| missing(Field::Created))?,
        completed: draft.completed,
        waiting_on: draft.waiting_on,
        tags: draft.tags,
        description: input[closing.text_end..].to_string(),
        extensions,
    })
}

fn read_field<'a>(
    draft: &mut Draft,
    cursor: &mut LineCursor<'a>,
    line: Line<'a>,
    found: FieldMatch<'a>,
) -> Result<(), Diagnostic> {
    let field = found.field;
    let name_columns = (1, field.name().len() + 1);

    if let Some(first) = draft.seen[field.index()] {
        return Err(Diagnostic::new(
            DiagnosticKind::DuplicateField,
            line.number,
            name_columns,
            format!(
                "field `{}` already set on line {first}",
                field.name()
            ),
        ));
    }
    draft.seen[field.index()] = Some(line.number);

    if field.is_list() {
        return read_list(draft, cursor, line, found);
    }

    let value = found.value;
    let value_columns = (found.value_column, found.value_column + value.len().max(1));
    if value.is_empty() {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptyValue,
            line.number,
            value_columns,
            format!("field `{}` has no value", field.name()),
        ));
    }

    let invalid = |kind: DiagnosticKind, message: String| {
        Diagnostic::new(kind, line.number, value_columns, message)
    };

    match field {
        Field::Title => draft.title = Some(value.to_string()),
        Field::Owner => draft.owner = Some(value.to_string()),
        Field::Status => {
            let status = value
                .parse::<Status>()
                .map_err(|err| invalid(DiagnosticKind::InvalidEnum, err.to_string()))?;
            draft.status = Some(status);
        }
        Field::Priority => {
            let priority = value
                .parse::<Priority>()
                .map_err(|err| invalid(DiagnosticKind::InvalidEnum, err.to_string()))?;
            draft.priority = Some(priority);
        }
        Field::PriorityValue => {
            let parsed = if value.bytes().all(|byte| byte.is_ascii_digit()) {
                value.parse::<u8>().ok()
            } else {
                None
            };
            let number = parsed.ok_or_else(|| {
                invalid(
                    DiagnosticKind::InvalidInteger,
                    format!("priority_value '{value}' is not an integer in 0..=255"),
                )
            })?;
            draft.priority_value = Some(number);
        }
        Field::Created | Field::Completed => {
            let timestamp = parse_timestamp(value).ok_or_else(|| {
                invalid(
                    DiagnosticKind::InvalidTimestamp,
                    format!(
                        "{} '{value}' is not a YYYY-MM-DDTHH:MM:SSZ timestamp",
                        field.name()
                    ),
                )
            })?;
            if field == Field::Created {
                draft.created = Some(timestamp);
            } else {
                draft.completed = Some(timestamp);
            }
        }
        Field::WaitingOn | Field::Tags => {}
    }

    Ok(())
}

fn read_list<'a>(
    draft: &mut Draft,
    cursor: &mut LineCursor<'a>,
    line: Line<'a>,
    found: FieldMatch<'a>,
) -> Result<(), Diagnostic> {
    let field = found.field;
    debug_assert_eq!(field.kind(), FieldKind::List);

    if !found.value.is_empty() {
        return Err(Diagnostic::new(
            DiagnosticKind::InlineListValue,
            line.number,
            (found.value_column, found.value_column + found.value.len()),
            format!(
                "list field `{}` takes its items on following `- ` lines",
                field.name()
            ),
        ));
    }

    let mut items = Vec::new();
    while let Some(next) = cursor.peek() {
        let Some(item) = next.text.strip_prefix(LIST_ITEM_PREFIX) else {
            break;
        };
        items.push(normalize_value(item).to_string());
        cursor.next_line();
    }

    if items.is_empty() {
        if field.required() {
            return Err(Diagnostic::new(
                DiagnosticKind::EmptyList,
                line.number,
                (1, field.name().len() + 1),
                format!("list field `{}` needs at least one item", field.name()),
            ));
        }
        return Ok(());
    }

    match field {
        Field::WaitingOn => draft.waiting_on = Some(items),
        Field::Tags => draft.tags = Some(items),
        _ => {}
    }
    Ok(())
}
