use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use logsaw_types::{BUILTIN_COLUMNS, Column, ID_PROPERTY_KEY, LogEvent};

use crate::buffer::CyclicBuffer;
use crate::comparator::ColumnComparator;
use crate::error::{ContainerError, ContainerResult};
use crate::listener::{ListenerId, Listeners};
use crate::rule::{Rule, RuleChange, RuleListener, SharedRule};

/// Visible and total row counts after a change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowCounts {
    pub visible: usize,
    pub total: usize,
}

/// A property key seen for the first time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewKey {
    pub key: String,
    /// Storage index of the row the key was first seen on
    pub row: usize,
}

/// Why cached row positions are no longer valid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeReason {
    Sorted,
    RuleChanged,
    ModeChanged,
    Resized,
    Cleared,
    Evicted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructureChange {
    /// A row was appended at `row`
    RowInserted { row: usize },
    /// Any cached row to index mapping must be discarded
    DataChanged(ChangeReason),
}

struct Row {
    event: Arc<LogEvent>,
    id: u64,
    visible: bool,
}

enum Storage {
    Cyclic(CyclicBuffer<Row>),
    Unbounded(Vec<Row>),
}

impl Storage {
    fn len(&self) -> usize {
        match self {
            Self::Cyclic(buffer) => buffer.len(),
            Self::Unbounded(rows) => rows.len(),
        }
    }

    fn get(&self, index: usize) -> Option<&Row> {
        match self {
            Self::Cyclic(buffer) => buffer.get(index),
            Self::Unbounded(rows) => rows.get(index),
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        match self {
            Self::Cyclic(buffer) => Box::new(buffer.iter()),
            Self::Unbounded(rows) => Box::new(rows.iter()),
        }
    }

    fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut Row> + '_> {
        match self {
            Self::Cyclic(buffer) => Box::new(buffer.iter_mut()),
            Self::Unbounded(rows) => Box::new(rows.iter_mut()),
        }
    }

    /// Append a row, returning the row evicted to make room
    fn push(&mut self, row: Row) -> Option<Row> {
        match self {
            Self::Cyclic(buffer) => buffer.add(row),
            Self::Unbounded(rows) => {
                rows.push(row);
                None
            }
        }
    }

    fn take_rows(&mut self) -> Vec<Row> {
        match self {
            Self::Cyclic(buffer) => {
                let capacity = buffer.max_size();
                let rows = std::mem::take(buffer).into_vec();
                buffer.resize(capacity);
                rows
            }
            Self::Unbounded(rows) => std::mem::take(rows),
        }
    }

    fn sort_by(&mut self, comparator: &ColumnComparator) {
        match self {
            Self::Cyclic(buffer) => {
                let capacity = buffer.max_size();
                let mut rows = std::mem::take(buffer).into_vec();
                rows.sort_by(|a, b| comparator.compare(&a.event, &b.event));
                buffer.resize(capacity);
                for row in rows {
                    buffer.add(row);
                }
            }
            Self::Unbounded(rows) => rows.sort_by(|a, b| comparator.compare(&a.event, &b.event)),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Cyclic(buffer) => buffer.clear(),
            Self::Unbounded(rows) => rows.clear(),
        }
    }
}

struct State {
    rows: Storage,
    capacity: usize,
    display_rule: Option<SharedRule>,
    sort: Option<ColumnComparator>,
    property_keys: Vec<String>,
    seen_keys: HashSet<String>,
    next_id: u64,
    visible_count: usize,
}

impl State {
    fn counts(&self) -> RowCounts {
        RowCounts {
            visible: self.visible_count,
            total: self.rows.len(),
        }
    }

    fn is_visible(&self, event: &LogEvent) -> bool {
        self.display_rule
            .as_ref()
            .is_none_or(|rule| rule.evaluate(event))
    }

    fn insert(&mut self, mut event: LogEvent, notices: &mut Notices) -> bool {
        let id = self.next_id;
        self.next_id += 1;
        event
            .properties
            .insert(ID_PROPERTY_KEY.to_string(), id.to_string());

        let visible = self.is_visible(&event);
        let unseen: Vec<String> = event
            .properties
            .keys()
            .filter(|key| key.as_str() != ID_PROPERTY_KEY && !self.seen_keys.contains(*key))
            .cloned()
            .collect();

        let row = Row {
            event: Arc::new(event),
            id,
            visible,
        };
        if let Some(evicted) = self.rows.push(row) {
            if evicted.visible {
                self.visible_count -= 1;
            }
            notices
                .structure
                .push(StructureChange::DataChanged(ChangeReason::Evicted));
        }
        if visible {
            self.visible_count += 1;
        }

        let row = self.rows.len() - 1;
        for key in unseen {
            self.seen_keys.insert(key.clone());
            self.property_keys.push(key.clone());
            notices.keys.push(NewKey { key, row });
        }
        notices.structure.push(StructureChange::RowInserted { row });
        visible
    }

    /// Re-evaluate every row against the display rule, then restore the sort
    fn refilter(&mut self) {
        let rule = self.display_rule.clone();
        let mut visible_count = 0;
        for row in self.rows.iter_mut() {
            row.visible = rule.as_ref().is_none_or(|r| r.evaluate(&row.event));
            if row.visible {
                visible_count += 1;
            }
        }
        self.visible_count = visible_count;

        if let Some(comparator) = &self.sort {
            self.rows.sort_by(comparator);
        }
    }

    fn recount(&mut self) {
        self.visible_count = self.rows.iter().filter(|row| row.visible).count();
    }

    fn column_names(&self) -> Vec<String> {
        BUILTIN_COLUMNS
            .iter()
            .map(|name| name.to_string())
            .chain(self.property_keys.iter().cloned())
            .collect()
    }
}

/// Notifications gathered under the lock and dispatched after it is released
#[derive(Default)]
struct Notices {
    keys: Vec<NewKey>,
    structure: Vec<StructureChange>,
    counts: Option<RowCounts>,
}

impl Notices {
    fn dispatch(self, inner: &ContainerInner) {
        for key in &self.keys {
            inner.key_listeners.fire(key);
        }
        for change in &self.structure {
            inner.structure_listeners.fire(change);
        }
        if let Some(counts) = &self.counts {
            inner.count_listeners.fire(counts);
        }
    }
}

struct ContainerInner {
    state: Mutex<State>,
    count_listeners: Listeners<RowCounts>,
    key_listeners: Listeners<NewKey>,
    structure_listeners: Listeners<StructureChange>,
    rule_subscription: Mutex<Option<(SharedRule, ListenerId)>>,
}

/// Thread-safe store of received log events.
///
/// Holds events in a cyclic (bounded) or unbounded sequence, tracks which rows
/// pass the display rule, keeps the active sort, and reports changes through
/// typed listener registries. Cloning yields another handle to the same store.
///
/// All storage mutation and every snapshot read go through a single lock.
/// Listeners are invoked after the lock is released, so a callback may call
/// back into the container; presentation code usually forwards notifications
/// into a channel with [`Listeners::forward_to`] instead.
#[derive(Clone)]
pub struct EventContainer {
    inner: Arc<ContainerInner>,
}

impl EventContainer {
    /// Create an empty container; `capacity` bounds the cyclic mode and must be at least 1
    pub fn new(cyclic: bool, capacity: usize) -> ContainerResult<Self> {
        if capacity < 1 {
            return Err(ContainerError::InvalidArgument(format!(
                "the buffer size ({}) is not a positive integer",
                capacity
            )));
        }

        let rows = if cyclic {
            Storage::Cyclic(CyclicBuffer::new(capacity)?)
        } else {
            Storage::Unbounded(Vec::new())
        };

        Ok(Self {
            inner: Arc::new(ContainerInner {
                state: Mutex::new(State {
                    rows,
                    capacity,
                    display_rule: None,
                    sort: None,
                    property_keys: Vec::new(),
                    seen_keys: HashSet::new(),
                    next_id: 1,
                    visible_count: 0,
                }),
                count_listeners: Listeners::new(),
                key_listeners: Listeners::new(),
                structure_listeners: Listeners::new(),
                rule_subscription: Mutex::new(None),
            }),
        })
    }

    /// Store one event and report whether it passes the display rule
    pub fn add_event(&self, event: LogEvent) -> bool {
        let mut notices = Notices::default();
        let visible = {
            let mut state = self.inner.state.lock();
            let visible = state.insert(event, &mut notices);
            notices.counts = Some(state.counts());
            visible
        };
        notices.dispatch(&self.inner);
        visible
    }

    /// Store a batch under one lock acquisition with a single count notification.
    ///
    /// Returns how many of the events are visible.
    pub fn add_events<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = LogEvent>,
    {
        let mut notices = Notices::default();
        let (added, visible) = {
            let mut state = self.inner.state.lock();
            let mut added = 0;
            let mut visible = 0;
            for event in events {
                added += 1;
                if state.insert(event, &mut notices) {
                    visible += 1;
                }
            }
            notices.counts = Some(state.counts());
            (added, visible)
        };
        notices.dispatch(&self.inner);
        debug!(added, visible, "Stored event batch");
        visible
    }

    /// Event at a storage index, ignoring the display rule
    pub fn get_row(&self, index: usize) -> Option<Arc<LogEvent>> {
        self.inner
            .state
            .lock()
            .rows
            .get(index)
            .map(|row| Arc::clone(&row.event))
    }

    /// Snapshot of the rows passing the display rule, in stored order
    pub fn filtered_events(&self) -> Vec<Arc<LogEvent>> {
        self.inner
            .state
            .lock()
            .rows
            .iter()
            .filter(|row| row.visible)
            .map(|row| Arc::clone(&row.event))
            .collect()
    }

    /// Snapshot of every stored row, in stored order
    pub fn all_events(&self) -> Vec<Arc<LogEvent>> {
        self.inner
            .state
            .lock()
            .rows
            .iter()
            .map(|row| Arc::clone(&row.event))
            .collect()
    }

    /// Snapshot of the rows matching `rule`, regardless of the display rule
    pub fn matching_events(&self, rule: &dyn Rule) -> Vec<Arc<LogEvent>> {
        self.inner
            .state
            .lock()
            .rows
            .iter()
            .filter(|row| rule.evaluate(&row.event))
            .map(|row| Arc::clone(&row.event))
            .collect()
    }

    /// Index of the first row from `start_row` (inclusive) that matches `rule`.
    ///
    /// Scans forward or backward without wrapping around.
    pub fn find(&self, rule: &dyn Rule, start_row: usize, forward: bool) -> Option<usize> {
        self.find_where(start_row, forward, |event| rule.evaluate(event))
    }

    /// Like [`find`](Self::find), matching a case-insensitive substring of any column
    pub fn find_text(&self, start_row: usize, text: &str, forward: bool) -> Option<usize> {
        let needle = text.to_lowercase();
        self.find_where(start_row, forward, |event| {
            (0..BUILTIN_COLUMNS.len()).filter_map(Column::builtin).any(|column| {
                column
                    .value(event)
                    .is_some_and(|value| value.to_lowercase().contains(&needle))
            })
        })
    }

    fn find_where<F>(&self, start_row: usize, forward: bool, matches: F) -> Option<usize>
    where
        F: Fn(&LogEvent) -> bool,
    {
        let state = self.inner.state.lock();
        let len = state.rows.len();
        if len == 0 {
            return None;
        }

        let matches_at =
            |index: &usize| state.rows.get(*index).is_some_and(|row| matches(&row.event));
        if forward {
            (start_row..len).find(matches_at)
        } else {
            (0..=start_row.min(len - 1)).rev().find(matches_at)
        }
    }

    /// Replace the display rule and re-evaluate every row.
    ///
    /// The container subscribes to the rule, so edits to a mediator or logger
    /// rule installed here refresh visibility without another call.
    pub fn set_display_rule(&self, rule: Option<SharedRule>) {
        let subscription = rule.as_ref().and_then(|rule| {
            rule.subscribe(self.refresher())
                .map(|id| (Arc::clone(rule), id))
        });
        let previous = std::mem::replace(&mut *self.inner.rule_subscription.lock(), subscription);
        if let Some((old_rule, id)) = previous {
            old_rule.unsubscribe(id);
        }

        let description = rule.as_ref().map(|r| r.describe());
        self.mutate(ChangeReason::RuleChanged, |state| {
            state.display_rule = rule;
            state.refilter();
        });
        debug!(rule = ?description, "Display rule changed");
    }

    pub fn display_rule(&self) -> Option<SharedRule> {
        self.inner.state.lock().display_rule.clone()
    }

    /// Listener that refilters whenever the installed rule is edited
    fn refresher(&self) -> RuleListener {
        let weak: Weak<ContainerInner> = Arc::downgrade(&self.inner);
        Arc::new(move |change: &RuleChange| {
            if let Some(inner) = weak.upgrade() {
                let container = EventContainer { inner };
                container.mutate(ChangeReason::RuleChanged, State::refilter);
                debug!(property = %change.property, "Display rule edited");
            }
        })
    }

    /// Switch between cyclic and unbounded storage, migrating the stored rows
    pub fn set_cyclic(&self, cyclic: bool) {
        if self.is_cyclic() == cyclic {
            return;
        }
        self.mutate(ChangeReason::ModeChanged, |state| {
            let rows = state.rows.take_rows();
            state.rows = if cyclic {
                let mut buffer = CyclicBuffer::default();
                buffer.resize(state.capacity);
                let skip = rows.len().saturating_sub(state.capacity);
                for row in rows.into_iter().skip(skip) {
                    buffer.add(row);
                }
                Storage::Cyclic(buffer)
            } else {
                Storage::Unbounded(rows)
            };
            state.recount();
        });
        debug!(cyclic, "Storage mode changed");
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self.inner.state.lock().rows, Storage::Cyclic(_))
    }

    /// Capacity of the cyclic buffer; fails when the container is unbounded
    pub fn max_size(&self) -> ContainerResult<usize> {
        match &self.inner.state.lock().rows {
            Storage::Cyclic(buffer) => Ok(buffer.max_size()),
            Storage::Unbounded(_) => Err(ContainerError::IllegalState(
                "the container is not cyclic, it has no maximum size".to_string(),
            )),
        }
    }

    /// Change the cyclic capacity, keeping the newest rows.
    ///
    /// In unbounded mode only the remembered capacity changes, which applies
    /// the next time the container becomes cyclic.
    pub fn resize(&self, capacity: usize) -> ContainerResult<()> {
        if capacity < 1 {
            return Err(ContainerError::InvalidArgument(format!(
                "the buffer size ({}) is not a positive integer",
                capacity
            )));
        }
        self.mutate(ChangeReason::Resized, |state| {
            state.capacity = capacity;
            if let Storage::Cyclic(buffer) = &mut state.rows {
                buffer.resize(capacity);
            }
            state.recount();
        });
        debug!(capacity, "Buffer resized");
        Ok(())
    }

    /// Sort by the column at `index` of [`column_names`](Self::column_names)
    pub fn sort_column(&self, index: usize, ascending: bool) -> ContainerResult<()> {
        let column = {
            let state = self.inner.state.lock();
            match Column::builtin(index) {
                Some(column) => column,
                None => state
                    .property_keys
                    .get(index - BUILTIN_COLUMNS.len())
                    .map(|key| Column::Property(key.clone()))
                    .ok_or_else(|| {
                        ContainerError::InvalidArgument(format!("no column at index {}", index))
                    })?,
            }
        };
        self.sort_by(column, ascending);
        Ok(())
    }

    /// Stable sort of every stored row; the sort is re-applied after refilters
    pub fn sort_by(&self, column: Column, ascending: bool) {
        let comparator = ColumnComparator::new(column, ascending);
        debug!(column = %comparator.column().name(), ascending, "Sorting rows");
        self.mutate(ChangeReason::Sorted, |state| {
            state.rows.sort_by(&comparator);
            state.sort = Some(comparator);
        });
    }

    pub fn current_sort(&self) -> Option<ColumnComparator> {
        self.inner.state.lock().sort.clone()
    }

    /// Drop every stored row; ids keep counting from where they were
    pub fn clear_model(&self) {
        self.mutate(ChangeReason::Cleared, |state| {
            state.rows.clear();
            state.visible_count = 0;
        });
        debug!("Container cleared");
    }

    /// Fire a row-count notification outside of any mutation
    pub fn notify_count_listeners(&self) {
        let counts = self.inner.state.lock().counts();
        self.inner.count_listeners.fire(&counts);
    }

    /// Current storage index of this exact event instance
    pub fn row_index(&self, event: &LogEvent) -> Option<usize> {
        self.inner
            .state
            .lock()
            .rows
            .iter()
            .position(|row| std::ptr::eq(Arc::as_ptr(&row.event), event))
    }

    /// Current storage index of the row with this synthetic id
    pub fn row_index_of_id(&self, id: u64) -> Option<usize> {
        self.inner
            .state
            .lock()
            .rows
            .iter()
            .position(|row| row.id == id)
    }

    /// Built-in column names followed by discovered property keys
    pub fn column_names(&self) -> Vec<String> {
        self.inner.state.lock().column_names()
    }

    /// Property keys in discovery order
    pub fn property_keys(&self) -> Vec<String> {
        self.inner.state.lock().property_keys.clone()
    }

    pub fn row_count(&self) -> usize {
        self.inner.state.lock().rows.len()
    }

    pub fn visible_count(&self) -> usize {
        self.inner.state.lock().visible_count
    }

    pub fn count_listeners(&self) -> &Listeners<RowCounts> {
        &self.inner.count_listeners
    }

    pub fn key_listeners(&self) -> &Listeners<NewKey> {
        &self.inner.key_listeners
    }

    pub fn structure_listeners(&self) -> &Listeners<StructureChange> {
        &self.inner.structure_listeners
    }

    /// Run a structural mutation, then fire the change and the new counts
    fn mutate<F>(&self, reason: ChangeReason, change: F)
    where
        F: FnOnce(&mut State),
    {
        let counts = {
            let mut state = self.inner.state.lock();
            change(&mut state);
            state.counts()
        };
        Notices {
            keys: Vec::new(),
            structure: vec![StructureChange::DataChanged(reason)],
            counts: Some(counts),
        }
        .dispatch(&self.inner);
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Some((rule, id)) = self.rule_subscription.get_mut().take() {
            rule.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ExpressionRule, LoggerRule, RuleMediator, accept_all, reject_all};
    use logsaw_types::Level;
    use std::thread;

    fn event(logger: &str) -> LogEvent {
        LogEvent::new(logger, Level::Info, "message")
    }

    fn loggers(events: &[Arc<LogEvent>]) -> Vec<String> {
        events.iter().map(|e| e.logger_name.clone()).collect()
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(
            EventContainer::new(true, 0),
            Err(ContainerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cyclic_container_evicts_oldest() {
        let container = EventContainer::new(true, 3).unwrap();
        for name in ["e1", "e2", "e3"] {
            container.add_event(event(name));
        }
        let first = container.get_row(0).unwrap();
        assert_eq!(container.row_index(&first), Some(0));

        container.add_event(event("e4"));
        container.add_event(event("e5"));

        assert_eq!(container.row_count(), 3);
        assert_eq!(loggers(&container.all_events()), vec!["e3", "e4", "e5"]);
        assert_eq!(container.row_index(&first), None);
        assert_eq!(container.visible_count(), 3);
    }

    #[test]
    fn test_ids_assigned_from_one() {
        let container = EventContainer::new(false, 10).unwrap();
        container.add_event(event("a"));
        container.add_event(event("b"));

        let ids: Vec<Option<u64>> = container.all_events().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
        assert_eq!(container.row_index_of_id(2), Some(1));
    }

    #[test]
    fn test_display_rule_switch_hides_everything() {
        let container = EventContainer::new(false, 100).unwrap();
        container.set_display_rule(Some(accept_all()));
        for i in 0..10 {
            assert!(container.add_event(event(&format!("logger{}", i))));
        }
        assert_eq!(container.filtered_events().len(), 10);

        container.set_display_rule(Some(reject_all()));
        assert_eq!(container.filtered_events().len(), 0);
        assert_eq!(container.all_events().len(), 10);
        assert_eq!(container.visible_count(), 0);
        assert!(!container.add_event(event("late")));
    }

    #[test]
    fn test_concurrent_producers_get_unique_ids() {
        let container = EventContainer::new(false, 10).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let container = container.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        container.add_event(event(&format!("t{}.{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<u64> = container
            .all_events()
            .iter()
            .filter_map(|e| e.id())
            .collect();
        assert_eq!(ids.len(), 4000);
        ids.sort_unstable();
        assert_eq!(ids, (1..=4000).collect::<Vec<u64>>());
    }

    #[test]
    fn test_sort_directions_are_exact_reverses() {
        let container = EventContainer::new(false, 10).unwrap();
        for name in ["delta", "alpha", "echo", "charlie", "bravo"] {
            container.add_event(event(name));
        }
        let logger_index = Column::Logger.index().unwrap();

        container.sort_column(logger_index, true).unwrap();
        let ascending = loggers(&container.all_events());
        assert_eq!(ascending, vec!["alpha", "bravo", "charlie", "delta", "echo"]);

        container.sort_column(logger_index, false).unwrap();
        let mut descending = loggers(&container.all_events());
        descending.reverse();
        assert_eq!(descending, ascending);

        assert!(container.sort_column(99, true).is_err());
    }

    #[test]
    fn test_sort_is_stable_and_reapplied_after_refilter() {
        let container = EventContainer::new(true, 10).unwrap();
        container.add_event(event("b").with_property("n", "1"));
        container.add_event(event("a"));
        container.add_event(event("b").with_property("n", "2"));
        container.sort_by(Column::Logger, true);

        let order: Vec<Option<String>> = container
            .all_events()
            .iter()
            .map(|e| e.property("n").map(str::to_string))
            .collect();
        assert_eq!(order, vec![None, Some("1".into()), Some("2".into())]);

        container.add_event(event("0-first"));
        container.set_display_rule(Some(accept_all()));
        assert_eq!(loggers(&container.all_events())[0], "0-first");
        assert_eq!(container.current_sort().map(|s| s.is_ascending()), Some(true));
    }

    #[test]
    fn test_new_key_fires_once_with_row_index() {
        let container = EventContainer::new(false, 100).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        container
            .key_listeners()
            .add(move |key: &NewKey| sink.lock().push(key.clone()));

        let batch = (0..60).map(|i| {
            let e = event("batch");
            if i >= 49 { e.with_property("tenant", "acme") } else { e }
        });
        container.add_events(batch);

        assert_eq!(
            *seen.lock(),
            vec![NewKey {
                key: "tenant".into(),
                row: 49
            }]
        );
        assert_eq!(container.property_keys(), vec!["tenant"]);
        assert_eq!(container.column_names().last().map(String::as_str), Some("tenant"));
    }

    #[test]
    fn test_batch_fires_one_count_notification() {
        let container = EventContainer::new(false, 100).unwrap();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        container
            .count_listeners()
            .add(move |c: &RowCounts| sink.lock().push(*c));

        container.set_display_rule(Some(Arc::new(ExpressionRule::parse("level >= WARN").unwrap())));
        container.add_events(vec![
            LogEvent::new("a", Level::Error, ""),
            LogEvent::new("a", Level::Debug, ""),
        ]);

        assert_eq!(
            counts.lock().last(),
            Some(&RowCounts {
                visible: 1,
                total: 2
            })
        );
        assert_eq!(counts.lock().len(), 2);
    }

    #[test]
    fn test_max_size_requires_cyclic_mode() {
        let container = EventContainer::new(false, 5).unwrap();
        assert!(matches!(
            container.max_size(),
            Err(ContainerError::IllegalState(_))
        ));

        container.set_cyclic(true);
        assert_eq!(container.max_size(), Ok(5));
    }

    #[test]
    fn test_set_cyclic_migrates_rows() {
        let container = EventContainer::new(false, 2).unwrap();
        for name in ["a", "b", "c"] {
            container.add_event(event(name));
        }

        container.set_cyclic(true);
        assert!(container.is_cyclic());
        assert_eq!(loggers(&container.all_events()), vec!["b", "c"]);

        container.set_cyclic(false);
        container.add_event(event("d"));
        assert_eq!(loggers(&container.all_events()), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_resize_keeps_newest_rows() {
        let container = EventContainer::new(true, 4).unwrap();
        for name in ["a", "b", "c", "d"] {
            container.add_event(event(name));
        }

        container.resize(2).unwrap();
        assert_eq!(loggers(&container.all_events()), vec!["c", "d"]);
        assert_eq!(container.max_size(), Ok(2));
        assert!(container.resize(0).is_err());
    }

    #[test]
    fn test_clear_keeps_id_counter_and_keys() {
        let container = EventContainer::new(false, 10).unwrap();
        container.add_event(event("a").with_property("k", "v"));
        container.add_event(event("b"));

        container.clear_model();
        assert_eq!(container.row_count(), 0);
        assert!(container.get_row(0).is_none());

        container.add_event(event("c"));
        assert_eq!(container.get_row(0).and_then(|e| e.id()), Some(3));
        assert_eq!(container.property_keys(), vec!["k"]);
    }

    #[test]
    fn test_find_scans_without_wrapping() {
        let container = EventContainer::new(false, 10).unwrap();
        for name in ["x", "target", "y", "target", "z"] {
            container.add_event(event(name));
        }
        let rule = ExpressionRule::parse("logger == target").unwrap();

        assert_eq!(container.find(&rule, 0, true), Some(1));
        assert_eq!(container.find(&rule, 2, true), Some(3));
        assert_eq!(container.find(&rule, 4, true), None);
        assert_eq!(container.find(&rule, 4, false), Some(3));
        assert_eq!(container.find(&rule, 2, false), Some(1));
        assert_eq!(container.find(&rule, 0, false), None);
        assert_eq!(container.find_text(0, "TARG", true), Some(1));
        assert_eq!(container.matching_events(&rule).len(), 2);
    }

    #[test]
    fn test_empty_container_lookups() {
        let container = EventContainer::new(true, 3).unwrap();
        assert!(container.get_row(0).is_none());
        assert!(container.filtered_events().is_empty());
        assert_eq!(container.find(&*accept_all(), 0, true), None);
        assert_eq!(container.find(&*accept_all(), 5, false), None);
        assert_eq!(container.row_index(&event("a")), None);
    }

    #[test]
    fn test_mediator_edits_refilter() {
        let container = EventContainer::new(false, 10).unwrap();
        let mediator = RuleMediator::new();
        let loggers_rule = LoggerRule::new();
        mediator.set_logger_rule(Some(Arc::new(loggers_rule.clone())));
        container.set_display_rule(Some(Arc::new(mediator.clone())));

        container.add_event(event("org.app.db"));
        container.add_event(event("org.web"));
        assert_eq!(container.visible_count(), 2);

        loggers_rule.hide("org.app");
        assert_eq!(container.visible_count(), 1);

        mediator.set_inclusion_rule(Some(reject_all()));
        assert_eq!(container.visible_count(), 0);

        container.set_display_rule(None);
        mediator.set_inclusion_rule(None);
        assert_eq!(container.visible_count(), 2);
    }

    #[test]
    fn test_structure_changes_reported() {
        let container = EventContainer::new(true, 1).unwrap();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        container
            .structure_listeners()
            .add(move |c: &StructureChange| sink.lock().push(*c));

        container.add_event(event("a"));
        container.add_event(event("b"));
        container.clear_model();

        assert_eq!(
            *changes.lock(),
            vec![
                StructureChange::RowInserted { row: 0 },
                StructureChange::DataChanged(ChangeReason::Evicted),
                StructureChange::RowInserted { row: 0 },
                StructureChange::DataChanged(ChangeReason::Cleared),
            ]
        );
    }
}
