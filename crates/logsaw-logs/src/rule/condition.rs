use std::sync::Arc;

use logsaw_types::{Level, LogEvent, resolve_field};

use super::pattern::PatternMatcher;

/// Relational operator for numeric and level comparisons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Inequality {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Inequality {
    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(Self::Less),
            "<=" => Some(Self::LessOrEqual),
            ">" => Some(Self::Greater),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    fn holds<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            Self::Less => left < right,
            Self::LessOrEqual => left <= right,
            Self::Greater => left > right,
            Self::GreaterOrEqual => left >= right,
        }
    }
}

/// Compiled form of a rule expression.
///
/// Absent fields never satisfy `==`, `~=`, `like` or an inequality; `!=` is
/// the negation of `==` and so holds for them.
#[derive(Debug, Clone)]
pub(crate) enum Condition {
    /// Every operand holds; a `&&` chain is stored flat
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Exists(String),
    Equals { field: String, value: String },
    LevelEquals(Level),
    PartialText { field: String, text: String },
    Like { field: String, matcher: Arc<dyn PatternMatcher> },
    Numeric { field: String, op: Inequality, value: i64 },
    LevelCompare { op: Inequality, level: Level },
}

impl Condition {
    pub(crate) fn evaluate(&self, event: &LogEvent) -> bool {
        match self {
            Self::And(all) => all.iter().all(|c| c.evaluate(event)),
            Self::Or(any) => any.iter().any(|c| c.evaluate(event)),
            Self::Not(inner) => !inner.evaluate(event),
            Self::Exists(field) => resolve_field(field, event).is_some_and(|v| !v.is_empty()),
            Self::Equals { field, value } => {
                resolve_field(field, event).is_some_and(|v| v.as_ref() == value)
            }
            Self::LevelEquals(level) => event.level == *level,
            Self::PartialText { field, text } => resolve_field(field, event)
                .is_some_and(|v| v.to_lowercase().contains(&text.to_lowercase())),
            Self::Like { field, matcher } => {
                resolve_field(field, event).is_some_and(|v| matcher.matches(&v))
            }
            Self::Numeric { field, op, value } => resolve_field(field, event)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .is_some_and(|n| op.holds(n, *value)),
            Self::LevelCompare { op, level } => op.holds(event.level.severity(), level.severity()),
        }
    }
}
