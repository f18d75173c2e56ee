use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use logsaw_types::LogEvent;

use super::{Rule, RuleChange, RuleListener};
use crate::listener::{ListenerId, Listeners};

#[derive(Default)]
struct LoggerState {
    hidden: BTreeSet<String>,
    focus: Option<String>,
}

#[derive(Default)]
struct LoggerRuleInner {
    state: RwLock<LoggerState>,
    listeners: Listeners<RuleChange>,
}

/// Rule driven by the logger tree: hides logger subtrees and can focus on one.
///
/// A hidden logger also hides its descendants (`org.app` hides `org.app.db`).
/// The empty name stands for the root logger.
#[derive(Clone, Default)]
pub struct LoggerRule {
    inner: Arc<LoggerRuleInner>,
}

impl LoggerRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide a logger and its descendants
    pub fn hide(&self, logger: &str) {
        let inserted = self.inner.state.write().hidden.insert(logger.to_string());
        if inserted {
            self.notify("hiddenLoggers", None, Some(logger.to_string()));
        }
    }

    /// Show a previously hidden logger
    pub fn show(&self, logger: &str) {
        let removed = self.inner.state.write().hidden.remove(logger);
        if removed {
            self.notify("hiddenLoggers", Some(logger.to_string()), None);
        }
    }

    /// Restrict display to one logger subtree, or clear the focus with `None`
    pub fn set_focus(&self, logger: Option<&str>) {
        let new_focus = logger.map(str::to_string);
        let old_focus = {
            let mut state = self.inner.state.write();
            if state.focus == new_focus {
                return;
            }
            std::mem::replace(&mut state.focus, new_focus.clone())
        };
        self.notify("focus", old_focus, new_focus);
    }

    /// Unhide everything and drop the focus
    pub fn clear(&self) {
        {
            let mut state = self.inner.state.write();
            if state.hidden.is_empty() && state.focus.is_none() {
                return;
            }
            state.hidden.clear();
            state.focus = None;
        }
        self.notify("hiddenLoggers", None, None);
    }

    pub fn hidden_loggers(&self) -> Vec<String> {
        self.inner.state.read().hidden.iter().cloned().collect()
    }

    pub fn focus(&self) -> Option<String> {
        self.inner.state.read().focus.clone()
    }

    fn notify(&self, property: &str, old_value: Option<String>, new_value: Option<String>) {
        self.inner
            .listeners
            .fire(&RuleChange::new(property, old_value, new_value));
    }
}

/// Whether `logger` is `ancestor` or sits below it in the dot hierarchy
fn is_within(logger: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || logger
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

impl Rule for LoggerRule {
    fn evaluate(&self, event: &LogEvent) -> bool {
        let state = self.inner.state.read();
        let logger = event.logger_name.as_str();

        if let Some(focus) = &state.focus {
            if !is_within(logger, focus) {
                return false;
            }
        }
        !state.hidden.iter().any(|hidden| is_within(logger, hidden))
    }

    fn describe(&self) -> String {
        let state = self.inner.state.read();
        format!(
            "loggers[hidden={:?}, focus={:?}]",
            state.hidden, state.focus
        )
    }

    fn subscribe(&self, listener: RuleListener) -> Option<ListenerId> {
        Some(self.inner.listeners.add_shared(listener))
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.inner.listeners.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsaw_types::Level;

    fn event(logger: &str) -> LogEvent {
        LogEvent::new(logger, Level::Info, "msg")
    }

    #[test]
    fn test_hide_covers_descendants_only() {
        let rule = LoggerRule::new();
        rule.hide("org.app");

        assert!(!rule.evaluate(&event("org.app")));
        assert!(!rule.evaluate(&event("org.app.db")));
        assert!(rule.evaluate(&event("org.application")));
        assert!(rule.evaluate(&event("com.other")));

        rule.show("org.app");
        assert!(rule.evaluate(&event("org.app.db")));
    }

    #[test]
    fn test_focus_restricts_to_subtree() {
        let rule = LoggerRule::new();
        rule.set_focus(Some("org.app"));

        assert!(rule.evaluate(&event("org.app.web")));
        assert!(!rule.evaluate(&event("com.other")));

        rule.hide("org.app.web");
        assert!(!rule.evaluate(&event("org.app.web")));
        assert!(rule.evaluate(&event("org.app.db")));

        rule.clear();
        assert!(rule.evaluate(&event("com.other")));
        assert!(rule.hidden_loggers().is_empty());
    }

    #[test]
    fn test_only_real_edits_notify() {
        let rule = LoggerRule::new();
        let fired = Arc::new(parking_lot::Mutex::new(0));
        let counter = Arc::clone(&fired);
        rule.subscribe(Arc::new(move |_: &RuleChange| *counter.lock() += 1));

        rule.hide("a");
        rule.hide("a");
        rule.set_focus(Some("b"));
        rule.set_focus(Some("b"));
        rule.show("missing");

        assert_eq!(*fired.lock(), 2);
    }
}
