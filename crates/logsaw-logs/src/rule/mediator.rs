use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use logsaw_types::LogEvent;

use super::{Rule, RuleChange, RuleListener, SharedRule};
use crate::listener::{ListenerId, Listeners};

/// The four sub-rule positions of a [`RuleMediator`], in evaluation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleSlot {
    Inclusion,
    Logger,
    Refinement,
    Exclusion,
}

impl RuleSlot {
    /// Property name used in change notifications
    pub fn property(&self) -> &'static str {
        match self {
            Self::Inclusion => "inclusionRule",
            Self::Logger => "loggerRule",
            Self::Refinement => "refinementRule",
            Self::Exclusion => "exclusionRule",
        }
    }
}

struct Installed {
    rule: SharedRule,
    subscription: Option<ListenerId>,
}

#[derive(Default)]
struct Slots {
    inclusion: Option<Installed>,
    logger: Option<Installed>,
    refinement: Option<Installed>,
    exclusion: Option<Installed>,
}

impl Slots {
    fn slot_mut(&mut self, slot: RuleSlot) -> &mut Option<Installed> {
        match slot {
            RuleSlot::Inclusion => &mut self.inclusion,
            RuleSlot::Logger => &mut self.logger,
            RuleSlot::Refinement => &mut self.refinement,
            RuleSlot::Exclusion => &mut self.exclusion,
        }
    }

    fn slot(&self, slot: RuleSlot) -> Option<&SharedRule> {
        let installed = match slot {
            RuleSlot::Inclusion => &self.inclusion,
            RuleSlot::Logger => &self.logger,
            RuleSlot::Refinement => &self.refinement,
            RuleSlot::Exclusion => &self.exclusion,
        };
        installed.as_ref().map(|i| &i.rule)
    }
}

#[derive(Default)]
struct MediatorInner {
    slots: RwLock<Slots>,
    listeners: Listeners<RuleChange>,
}

/// Combines inclusion, logger, refinement and exclusion rules.
///
/// Evaluation short-circuits in that order: the first installed sub-rule that
/// rejects the event decides the result. Empty slots accept everything.
/// Replacing a sub-rule, or editing an installed one, notifies subscribers.
#[derive(Clone, Default)]
pub struct RuleMediator {
    inner: Arc<MediatorInner>,
}

impl RuleMediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_inclusion_rule(&self, rule: Option<SharedRule>) {
        self.set_rule(RuleSlot::Inclusion, rule);
    }

    pub fn set_logger_rule(&self, rule: Option<SharedRule>) {
        self.set_rule(RuleSlot::Logger, rule);
    }

    pub fn set_refinement_rule(&self, rule: Option<SharedRule>) {
        self.set_rule(RuleSlot::Refinement, rule);
    }

    pub fn set_exclusion_rule(&self, rule: Option<SharedRule>) {
        self.set_rule(RuleSlot::Exclusion, rule);
    }

    pub fn inclusion_rule(&self) -> Option<SharedRule> {
        self.rule(RuleSlot::Inclusion)
    }

    pub fn logger_rule(&self) -> Option<SharedRule> {
        self.rule(RuleSlot::Logger)
    }

    pub fn refinement_rule(&self) -> Option<SharedRule> {
        self.rule(RuleSlot::Refinement)
    }

    pub fn exclusion_rule(&self) -> Option<SharedRule> {
        self.rule(RuleSlot::Exclusion)
    }

    /// Current occupant of a slot
    pub fn rule(&self, slot: RuleSlot) -> Option<SharedRule> {
        self.inner.slots.read().slot(slot).cloned()
    }

    /// Replace the rule in a slot and notify subscribers.
    ///
    /// The mediator subscribes to the new rule so that edits to it are
    /// forwarded, and drops its subscription to the rule being replaced.
    pub fn set_rule(&self, slot: RuleSlot, rule: Option<SharedRule>) {
        let new_value = rule.as_ref().map(|r| r.describe());
        let installed = rule.map(|rule| {
            let subscription = rule.subscribe(self.forwarder());
            Installed { rule, subscription }
        });

        let previous = std::mem::replace(self.inner.slots.write().slot_mut(slot), installed);

        let old_value = previous.map(|old| {
            if let Some(id) = old.subscription {
                old.rule.unsubscribe(id);
            }
            old.rule.describe()
        });

        self.inner
            .listeners
            .fire(&RuleChange::new(slot.property(), old_value, new_value));
    }

    /// Listener that re-fires a sub-rule's changes as the mediator's own
    fn forwarder(&self) -> RuleListener {
        let weak: Weak<MediatorInner> = Arc::downgrade(&self.inner);
        Arc::new(move |change: &RuleChange| {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.fire(change);
            }
        })
    }
}

impl Rule for RuleMediator {
    fn evaluate(&self, event: &LogEvent) -> bool {
        let slots = self.inner.slots.read();
        [
            RuleSlot::Inclusion,
            RuleSlot::Logger,
            RuleSlot::Refinement,
            RuleSlot::Exclusion,
        ]
        .into_iter()
        .filter_map(|slot| slots.slot(slot))
        .all(|rule| rule.evaluate(event))
    }

    fn describe(&self) -> String {
        let slots = self.inner.slots.read();
        let parts: Vec<String> = [
            RuleSlot::Inclusion,
            RuleSlot::Logger,
            RuleSlot::Refinement,
            RuleSlot::Exclusion,
        ]
        .into_iter()
        .filter_map(|slot| slots.slot(slot).map(|r| format!("{}={}", slot.property(), r.describe())))
        .collect();
        format!("mediator[{}]", parts.join(", "))
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
    use crate::rule::{LoggerRule, accept_all, from_fn, reject_all};
    use logsaw_types::Level;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(level: Level) -> LogEvent {
        LogEvent::new("org.app", level, "msg")
    }

    fn record_changes(mediator: &RuleMediator) -> Arc<Mutex<Vec<RuleChange>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        mediator.subscribe(Arc::new(move |c: &RuleChange| sink.lock().push(c.clone())));
        changes
    }

    #[test]
    fn test_empty_mediator_accepts_everything() {
        let mediator = RuleMediator::new();
        for level in Level::ALL_LEVELS {
            assert!(mediator.evaluate(&event(level)));
        }
    }

    #[test]
    fn test_rejecting_inclusion_rule_rejects_everything() {
        let mediator = RuleMediator::new();
        mediator.set_inclusion_rule(Some(reject_all()));
        for level in Level::ALL_LEVELS {
            assert!(!mediator.evaluate(&event(level)));
        }
    }

    #[test]
    fn test_short_circuits_in_slot_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mediator = RuleMediator::new();
        mediator.set_inclusion_rule(Some(reject_all()));
        mediator.set_exclusion_rule(Some(Arc::new(from_fn("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }))));

        assert!(!mediator.evaluate(&event(Level::Info)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        mediator.set_inclusion_rule(None);
        assert!(mediator.evaluate(&event(Level::Info)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exclusion_rule_decides_last() {
        let mediator = RuleMediator::new();
        mediator.set_inclusion_rule(Some(accept_all()));
        mediator.set_refinement_rule(Some(accept_all()));
        mediator.set_exclusion_rule(Some(Arc::new(from_fn("not debug", |e: &LogEvent| {
            e.level != Level::Debug
        }))));

        assert!(mediator.evaluate(&event(Level::Warn)));
        assert!(!mediator.evaluate(&event(Level::Debug)));
    }

    #[test]
    fn test_slot_replacement_fires_change() {
        let mediator = RuleMediator::new();
        let changes = record_changes(&mediator);

        mediator.set_refinement_rule(Some(accept_all()));
        mediator.set_refinement_rule(Some(reject_all()));

        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], RuleChange::new("refinementRule", None, Some("accept all".into())));
        assert_eq!(
            changes[1],
            RuleChange::new(
                "refinementRule",
                Some("accept all".into()),
                Some("reject all".into())
            )
        );
    }

    #[test]
    fn test_forwards_nested_changes_until_replaced() {
        let mediator = RuleMediator::new();
        let loggers = LoggerRule::new();
        mediator.set_logger_rule(Some(Arc::new(loggers.clone())));
        let changes = record_changes(&mediator);

        loggers.hide("org.app");
        assert_eq!(changes.lock().len(), 1);
        assert!(!mediator.evaluate(&event(Level::Info)));

        mediator.set_logger_rule(None);
        assert_eq!(changes.lock().len(), 2);

        // The old logger rule is no longer wired to the mediator
        loggers.show("org.app");
        assert_eq!(changes.lock().len(), 2);
        assert!(mediator.evaluate(&event(Level::Info)));
    }
}
