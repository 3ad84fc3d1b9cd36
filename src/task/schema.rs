//! Header field table shared by the parser and the serializer.
//!
//! Field order here is the order the serializer writes; the parser matches
//! by name and accepts any order.
//!
//! Whitespace rule for text values (scalar fields and list items): the
//! parser stores [`normalize_value`] of what it reads, so a value with
//! leading or trailing whitespace cannot survive a write and read back.
//! The validator rejects such values through [`is_trimmed`], and a value is
//! empty when nothing is left after normalizing. Extension lines are not
//! values and are kept verbatim.

/// Delimiter line that opens and closes the header.
pub const DELIMITER: &str = "---";

/// Prefix of a list item line.
pub const LIST_ITEM_PREFIX: &str = "- ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Status,
    Priority,
    Integer,
    Timestamp,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Status,
    Priority,
    PriorityValue,
    Owner,
    Created,
    Completed,
    WaitingOn,
    Tags,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Title,
        Field::Status,
        Field::Priority,
        Field::PriorityValue,
        Field::Owner,
        Field::Created,
        Field::Completed,
        Field::WaitingOn,
        Field::Tags,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Status => "status",
            Field::Priority => "priority",
            Field::PriorityValue => "priority_value",
            Field::Owner => "owner",
            Field::Created => "created",
            Field::Completed => "completed",
            Field::WaitingOn => "waiting_on",
            Field::Tags => "tags",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Title | Field::Owner => FieldKind::Text,
            Field::Status => FieldKind::Status,
            Field::Priority => FieldKind::Priority,
            Field::PriorityValue => FieldKind::Integer,
            Field::Created | Field::Completed => FieldKind::Timestamp,
            Field::WaitingOn | Field::Tags => FieldKind::List,
        }
    }

    pub fn required(self) -> bool {
        !matches!(self, Field::Completed | Field::WaitingOn | Field::Tags)
    }

    pub fn is_list(self) -> bool {
        self.kind() == FieldKind::List
    }

    /// Position in [`Field::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The form a text value takes once it has been read back from a header.
pub fn normalize_value(value: &str) -> &str {
    value.trim()
}

/// True if the value reads back unchanged.
pub fn is_trimmed(value: &str) -> bool {
    normalize_value(value) == value
}

/// A header line that names a known field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatch<'a> {
    pub field: Field,
    /// 1-based byte column where the value starts.
    pub value_column: usize,
    pub value: &'a str,
}

/// Match `name <ws>? : <ws>? value` against every known field.
///
/// A field name that is merely a prefix of the line's key (`priority` vs
/// `priority_value`, `title` vs `titles`) does not match.
pub fn match_field(line: &str) -> Option<FieldMatch<'_>> {
    Field::ALL.into_iter().find_map(|field| {
        let rest = line.strip_prefix(field.name())?;
        let value = rest.trim_start_matches([' ', '\t']).strip_prefix(':')?;
        let value = value.trim_start();
        Some(FieldMatch {
            field,
            value_column: line.len() - value.len() + 1,
            value: normalize_value(value),
        })
    })
}

/// True if the line would be read back as something other than an
/// extension line. `- ` lines are not reserved: extensions are written
/// before any list field, so they never read back as list items.
pub fn is_reserved_line(line: &str) -> bool {
    line == DELIMITER || match_field(line).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_indexes_follow_declaration_order() {
        for (position, field) in Field::ALL.into_iter().enumerate() {
            assert_eq!(field.index(), position);
        }
    }

    #[test]
    fn match_field_handles_spacing_and_prefixes() {
        let found = match_field("priority_value :  12").expect("match");
        assert_eq!(found.field, Field::PriorityValue);
        assert_eq!(found.value, "12");
        assert_eq!(found.value_column, 19);

        let found = match_field("priority:high").expect("match");
        assert_eq!(found.field, Field::Priority);
        assert_eq!(found.value, "high");

        assert!(match_field("titles: many").is_none());
        assert!(match_field("status_note: later").is_none());
        assert!(match_field(" title: indented").is_none());
    }

    #[test]
    fn list_field_without_value_matches_empty() {
        let found = match_field("tags:").expect("match");
        assert_eq!(found.field, Field::Tags);
        assert_eq!(found.value, "");
    }

    #[test]
    fn reserved_lines_cannot_be_extensions() {
        assert!(is_reserved_line("---"));
        assert!(is_reserved_line("owner: me"));
        assert!(!is_reserved_line("- item"));
        assert!(!is_reserved_line("estimate: 3d"));
    }

    #[test]
    fn normalized_values_are_trimmed_on_both_ends() {
        assert_eq!(normalize_value(" a \t"), "a");
        assert!(is_trimmed("a b"));
        assert!(is_trimmed(""));
        assert!(!is_trimmed(" padded title"));
        assert!(!is_trimmed("a "));

        let found = match_field("title:  padded title \t").expect("match");
        assert_eq!(found.value, "padded title");
        assert!(is_trimmed(found.value));
    }
}
