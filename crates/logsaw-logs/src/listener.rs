use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Handle returned on registration, used to remove a listener again
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Shared listener callback
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Typed observer registry for one category of notification.
///
/// `fire` works on a snapshot of the registered callbacks, so a callback may
/// register or remove listeners without deadlocking.
pub struct Listeners<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Callback<T>)>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a closure
    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_shared(Arc::new(callback))
    }

    /// Register an already shared callback
    pub fn add_shared(&self, callback: Callback<T>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, callback));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invoke every registered callback with `event`
    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone + Send + 'static> Listeners<T> {
    /// Queue notifications onto a channel instead of handling them inline.
    ///
    /// This is how a single-threaded presentation task receives container
    /// notifications. The listener stays registered after the receiver is
    /// dropped; sends to a closed channel are ignored.
    pub fn forward_to(&self, tx: mpsc::UnboundedSender<T>) -> ListenerId {
        self.add(move |event: &T| {
            let _ = tx.send(event.clone());
        })
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fire_and_remove() {
        let listeners = Listeners::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&total);
        let id = listeners.add(move |n| {
            counter.fetch_add(*n as usize, Ordering::SeqCst);
        });

        listeners.fire(&3);
        listeners.fire(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.fire(&10);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_callback_may_register_listener() {
        let listeners = Arc::new(Listeners::<()>::new());
        let inner = Arc::clone(&listeners);
        listeners.add(move |_| {
            inner.add(|_| {});
        });

        listeners.fire(&());
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_forward_to_channel() {
        let listeners = Listeners::<String>::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        listeners.forward_to(tx);

        listeners.fire(&"first".to_string());
        listeners.fire(&"second".to_string());

        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
    }
}
