use std::borrow::Cow;
use std::fmt;

use crate::{ID_PROPERTY_KEY, LogEvent};

/// Names of the built-in columns, in display order
pub const BUILTIN_COLUMNS: [&str; 14] = [
    "Logger",
    "Timestamp",
    "Level",
    "Thread",
    "Message",
    "NDC",
    "MDC",
    "Throwable",
    "Class",
    "Method",
    "File",
    "Line",
    "Properties",
    "ID",
];

/// A table column. Anything that is not a built-in column names a property key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Logger,
    Timestamp,
    Level,
    Thread,
    Message,
    Ndc,
    Mdc,
    Throwable,
    Class,
    Method,
    File,
    Line,
    Properties,
    Id,
    Property(String),
}

impl Column {
    /// Resolve a built-in column by its position in [`BUILTIN_COLUMNS`]
    pub fn builtin(index: usize) -> Option<Self> {
        let column = match index {
            0 => Self::Logger,
            1 => Self::Timestamp,
            2 => Self::Level,
            3 => Self::Thread,
            4 => Self::Message,
            5 => Self::Ndc,
            6 => Self::Mdc,
            7 => Self::Throwable,
            8 => Self::Class,
            9 => Self::Method,
            10 => Self::File,
            11 => Self::Line,
            12 => Self::Properties,
            13 => Self::Id,
            _ => return None,
        };
        Some(column)
    }

    /// Resolve a column by name (case-insensitive); unknown names become property columns
    pub fn from_name(name: &str) -> Self {
        BUILTIN_COLUMNS
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(Self::builtin)
            .unwrap_or_else(|| Self::Property(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Property(key) => key.as_str(),
            other => BUILTIN_COLUMNS[other.index().unwrap_or_default()],
        }
    }

    /// Position among the built-in columns (None for property columns)
    pub fn index(&self) -> Option<usize> {
        let index = match self {
            Self::Logger => 0,
            Self::Timestamp => 1,
            Self::Level => 2,
            Self::Thread => 3,
            Self::Message => 4,
            Self::Ndc => 5,
            Self::Mdc => 6,
            Self::Throwable => 7,
            Self::Class => 8,
            Self::Method => 9,
            Self::File => 10,
            Self::Line => 11,
            Self::Properties => 12,
            Self::Id => 13,
            Self::Property(_) => return None,
        };
        Some(index)
    }

    /// Text shown for this column of an event
    pub fn value<'a>(&self, event: &'a LogEvent) -> Option<Cow<'a, str>> {
        match self {
            Self::Logger => Some(Cow::Borrowed(event.logger_name.as_str())),
            Self::Timestamp => Some(Cow::Owned(event.timestamp.to_string())),
            Self::Level => Some(Cow::Borrowed(event.level.as_str())),
            Self::Thread => Some(Cow::Borrowed(event.thread_name.as_str())),
            Self::Message => Some(Cow::Borrowed(event.message.as_str())),
            Self::Ndc => event.ndc.as_deref().map(Cow::Borrowed),
            Self::Mdc | Self::Properties => Some(Cow::Owned(event.properties_text())),
            Self::Throwable => event.throwable_text().map(Cow::Owned),
            Self::Class => event.location.as_ref().map(|l| Cow::Borrowed(l.class_name.as_str())),
            Self::Method => event.location.as_ref().map(|l| Cow::Borrowed(l.method_name.as_str())),
            Self::File => event.location.as_ref().map(|l| Cow::Borrowed(l.file_name.as_str())),
            Self::Line => event.location.as_ref().map(|l| Cow::Borrowed(l.line_number.as_str())),
            Self::Id => event.property(ID_PROPERTY_KEY).map(Cow::Borrowed),
            Self::Property(key) => event.property(key).map(Cow::Borrowed),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a rule-expression field name against an event.
///
/// Field names are case-insensitive. `PROP.<key>` and `MDC.<key>` address
/// properties. Absent optional fields and unknown names resolve to `None`.
pub fn resolve_field<'a>(field: &str, event: &'a LogEvent) -> Option<Cow<'a, str>> {
    if let Some((prefix, key)) = field.split_once('.') {
        if prefix.eq_ignore_ascii_case("PROP") || prefix.eq_ignore_ascii_case("MDC") {
            return event.property(key).map(Cow::Borrowed);
        }
    }

    let column = match field.to_ascii_uppercase().as_str() {
        "LOGGER" => Column::Logger,
        "LEVEL" => Column::Level,
        "CLASS" => Column::Class,
        "FILE" => Column::File,
        "LINE" => Column::Line,
        "METHOD" => Column::Method,
        "MSG" | "MESSAGE" => Column::Message,
        "NDC" => Column::Ndc,
        "EXCEPTION" | "THROWABLE" => Column::Throwable,
        "TIMESTAMP" => Column::Timestamp,
        "THREAD" => Column::Thread,
        "ID" => Column::Id,
        _ => return None,
    };
    column.value(event)
}
