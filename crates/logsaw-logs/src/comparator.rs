use std::cmp::Ordering;

use logsaw_types::{Column, LocationInfo, LogEvent};

/// Compare two strings ignoring case
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Per-column ordering of log events used when sorting the table.
///
/// Columns without comparable data on both sides (no NDC, no location, no
/// throwable, missing property) compare as equal so a stable sort keeps
/// their existing order.
///
/// Those columns are therefore not a total order when some rows lack the
/// value: a missing value is "equal" to everything, so rows that do carry
/// one are only ordered relative to neighbours that also carry one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnComparator {
    column: Column,
    ascending: bool,
}

impl ColumnComparator {
    pub fn new(column: Column, ascending: bool) -> Self {
        Self { column, ascending }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Compare two events; descending order inverts everything except ties
    pub fn compare(&self, a: &LogEvent, b: &LogEvent) -> Ordering {
        let ordering = self.natural_order(a, b);
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }

    fn natural_order(&self, a: &LogEvent, b: &LogEvent) -> Ordering {
        match &self.column {
            Column::Level => a.level.severity().cmp(&b.level.severity()),
            Column::Logger => cmp_ignore_case(&a.logger_name, &b.logger_name),
            Column::Thread => cmp_ignore_case(&a.thread_name, &b.thread_name),
            Column::Message => cmp_ignore_case(&a.message, &b.message),
            Column::Ndc => match (&a.ndc, &b.ndc) {
                (Some(x), Some(y)) => cmp_ignore_case(x, y),
                _ => Ordering::Equal,
            },
            Column::Timestamp => a.timestamp.cmp(&b.timestamp),
            // Newer rows (higher ids) come first in the natural order
            Column::Id => b.id().cmp(&a.id()),
            Column::Class => compare_location(a, b, |x, y| cmp_ignore_case(&x.class_name, &y.class_name)),
            Column::Method => compare_location(a, b, |x, y| cmp_ignore_case(&x.method_name, &y.method_name)),
            Column::File => compare_location(a, b, |x, y| cmp_ignore_case(&x.file_name, &y.file_name)),
            Column::Line => compare_location(a, b, |x, y| compare_line(&x.line_number, &y.line_number)),
            Column::Throwable => match (&a.throwable, &b.throwable) {
                (Some(x), Some(y)) => x
                    .iter()
                    .zip(y)
                    .map(|(p, q)| cmp_ignore_case(p, q))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
            Column::Mdc | Column::Properties => Ordering::Equal,
            Column::Property(key) => match (a.property(key), b.property(key)) {
                (Some(x), Some(y)) => cmp_ignore_case(x, y),
                _ => Ordering::Equal,
            },
        }
    }
}

fn compare_location<F>(a: &LogEvent, b: &LogEvent, compare: F) -> Ordering
where
    F: Fn(&LocationInfo, &LocationInfo) -> Ordering,
{
    match (&a.location, &b.location) {
        (Some(x), Some(y)) => compare(x, y),
        _ => Ordering::Equal,
    }
}

/// Line numbers compare numerically when both parse, textually otherwise
fn compare_line(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => cmp_ignore_case(a, b),
    }
}
