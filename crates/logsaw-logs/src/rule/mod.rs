//! Composable predicates over log events

mod condition;
mod expression;
mod logger;
mod mediator;
mod pattern;

use std::fmt;
use std::sync::Arc;

use logsaw_types::LogEvent;

use crate::listener::{Callback, ListenerId};

pub use expression::{ExpressionRule, MAX_NESTING};
pub use logger::LoggerRule;
pub use mediator::{RuleMediator, RuleSlot};
pub use pattern::{GlobMatcher, PatternMatcher, PatternSyntax, RegexMatcher};

/// Rule shared between the container, the mediator and the presentation layer
pub type SharedRule = Arc<dyn Rule>;

/// Listener for rule edits
pub type RuleListener = Callback<RuleChange>;

/// A boolean predicate over a log event.
///
/// Rules with mutable state announce edits through `subscribe`; stateless
/// rules keep the default no-op implementation.
pub trait Rule: Send + Sync {
    fn evaluate(&self, event: &LogEvent) -> bool;

    /// Short human-readable form, used in change notifications
    fn describe(&self) -> String {
        "<rule>".to_string()
    }

    /// Register for change notifications; `None` if the rule never changes
    fn subscribe(&self, _listener: RuleListener) -> Option<ListenerId> {
        None
    }

    fn unsubscribe(&self, _id: ListenerId) {}
}

/// Notification that a rule, or one of its parts, was edited
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleChange {
    /// Name of the edited property (e.g. `inclusionRule`, `hiddenLoggers`)
    pub property: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl RuleChange {
    pub fn new(property: impl Into<String>, old_value: Option<String>, new_value: Option<String>) -> Self {
        Self {
            property: property.into(),
            old_value,
            new_value,
        }
    }
}

/// Rule backed by a closure
pub struct FnRule<F> {
    name: String,
    predicate: F,
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&LogEvent) -> bool + Send + Sync,
{
    fn evaluate(&self, event: &LogEvent) -> bool {
        (self.predicate)(event)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("name", &self.name).finish()
    }
}

/// Wrap a closure as a named rule
pub fn from_fn<F>(name: impl Into<String>, predicate: F) -> FnRule<F>
where
    F: Fn(&LogEvent) -> bool + Send + Sync,
{
    FnRule {
        name: name.into(),
        predicate,
    }
}

/// Rule that accepts every event
pub fn accept_all() -> SharedRule {
    Arc::new(from_fn("accept all", |_| true))
}

/// Rule that rejects every event
pub fn reject_all() -> SharedRule {
    Arc::new(from_fn("reject all", |_| false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsaw_types::Level;

    #[test]
    fn test_fn_rule() {
        let rule = from_fn("errors", |e: &LogEvent| e.level == Level::Error);
        assert!(rule.evaluate(&LogEvent::new("a", Level::Error, "x")));
        assert!(!rule.evaluate(&LogEvent::new("a", Level::Info, "x")));
        assert_eq!(rule.describe(), "errors");
        assert!(rule.subscribe(Arc::new(|_| {})).is_none());
    }
}
