//! [`TaskRecord`] -> task file text.

use std::fmt::Write as _;

use super::model::{format_timestamp, TaskRecord};
use super::schema::{Field, DELIMITER, LIST_ITEM_PREFIX};

/// Render a record in canonical form.
///
/// Scalar fields come first in table order, then extension lines in their
/// original order, then the list fields, then the closing delimiter
/// immediately followed by the description. Absent optional fields are
/// omitted. Extension lines never follow a list field, so one that starts
/// with `- ` cannot be read back as a list item.
pub fn render(record: &TaskRecord) -> String {
    let mut out = String::with_capacity(256 + record.description.len());
    out.push_str(DELIMITER);
    out.push('\n');

    for field in Field::ALL {
        match field {
            Field::Title => scalar(&mut out, field, &record.title),
            Field::Status => scalar(&mut out, field, record.status.as_str()),
            Field::Priority => scalar(&mut out, field, record.priority.as_str()),
            Field::PriorityValue => {
                let _ = writeln!(out, "{}: {}", field.name(), record.priority_value);
            }
            Field::Owner => scalar(&mut out, field, &record.owner),
            Field::Created => scalar(&mut out, field, &format_timestamp(&record.created)),
            Field::Completed => {
                if let Some(completed) = &record.completed {
                    scalar(&mut out, field, &format_timestamp(completed));
                }
            }
            Field::WaitingOn => {
                for line in &record.extensions {
                    out.push_str(line);
                    out.push('\n');
                }
                list(&mut out, field, record.waiting_on.as_deref());
            }
            Field::Tags => list(&mut out, field, record.tags.as_deref()),
        }
    }

    out.push_str(DELIMITER);
    out.push_str(&record.description);
    out
}

fn scalar(out: &mut String, field: Field, value: &str) {
    let _ = writeln!(out, "{}: {}", field.name(), value);
}

fn list(out: &mut String, field: Field, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    let _ = writeln!(out, "{}:", field.name());
    for item in items {
        out.push_str(LIST_ITEM_PREFIX);
        out.push_str(item);
        out.push('\n');
    }
}
