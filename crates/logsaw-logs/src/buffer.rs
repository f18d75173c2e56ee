use std::fmt;

use crate::error::{ContainerError, ContainerResult};

/// Fixed-capacity ring buffer that overwrites its oldest element once full.
///
/// Indexing is oldest-first: `get(0)` is the oldest element still held.
/// The buffer does no locking of its own; the owning container serializes access.
pub struct CyclicBuffer<T> {
    /// Ring storage, `None` marks an empty slot
    slots: Vec<Option<T>>,

    /// Physical index of the logically oldest element
    first: usize,

    /// Number of elements currently held
    len: usize,
}

impl<T> CyclicBuffer<T> {
    /// Create a buffer holding at most `max_size` elements
    pub fn new(max_size: usize) -> ContainerResult<Self> {
        if max_size < 1 {
            return Err(ContainerError::InvalidArgument(format!(
                "the max size ({}) is not a positive integer",
                max_size
            )));
        }
        Ok(Self::with_slots(max_size))
    }

    fn with_slots(max_size: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(max_size).collect(),
            first: 0,
            len: 0,
        }
    }

    /// Build a buffer from items in oldest-first order, keeping only the newest `max_size`
    pub fn from_items<I>(max_size: usize, items: I) -> ContainerResult<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let mut buffer = Self::new(max_size)?;
        for item in items {
            buffer.add(item);
        }
        Ok(buffer)
    }

    /// Append an item as the newest element.
    ///
    /// Returns the element evicted to make room, if the buffer was full.
    pub fn add(&mut self, item: T) -> Option<T> {
        let capacity = self.slots.len();
        if capacity == 0 {
            return Some(item);
        }

        if self.len < capacity {
            let last = (self.first + self.len) % capacity;
            self.slots[last] = Some(item);
            self.len += 1;
            None
        } else {
            // Full: the oldest slot is also the next write position
            let evicted = self.slots[self.first].replace(item);
            self.first = (self.first + 1) % capacity;
            evicted
        }
    }

    /// Get the i-th oldest element
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    /// Get the i-th oldest element mutably
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let physical = self.physical(index);
        self.slots[physical].as_mut()
    }

    /// Replace the element at a logical position, returning the previous one
    pub fn set(&mut self, index: usize, item: T) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let physical = self.physical(index);
        self.slots[physical].replace(item)
    }

    /// Remove the element at a logical position, shifting newer elements down
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }

        let physical = self.physical(index);
        let removed = self.slots[physical].take();
        for i in index..self.len - 1 {
            let from = self.physical(i + 1);
            let to = self.physical(i);
            self.slots[to] = self.slots[from].take();
        }
        self.len -= 1;
        removed
    }

    /// Remove and return the oldest element
    pub fn pop_oldest(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let oldest = self.slots[self.first].take();
        self.first = (self.first + 1) % self.slots.len();
        self.len -= 1;
        oldest
    }

    /// Change the capacity, keeping the newest `min(new_size, len)` elements oldest-first.
    ///
    /// A capacity of zero is accepted; such a buffer discards every added item.
    pub fn resize(&mut self, new_size: usize) {
        if new_size == self.slots.len() {
            return;
        }

        let keep = new_size.min(self.len);
        let skip = self.len - keep;
        let mut resized = Self::with_slots(new_size);
        for (i, item) in std::mem::take(self).into_vec().into_iter().enumerate() {
            if i >= skip {
                resized.add(item);
            }
        }
        *self = resized;
    }

    /// Drop every element, keeping the capacity
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.first = 0;
        self.len = 0;
    }

    /// Number of elements currently held
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next add will evict the oldest element
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn max_size(&self) -> usize {
        self.slots.len()
    }

    /// Iterate oldest-first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        let (wrapped, head) = self.slots.split_at(self.first);
        head.iter().chain(wrapped.iter()).filter_map(Option::as_ref)
    }

    /// Iterate oldest-first with mutable access
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let (wrapped, head) = self.slots.split_at_mut(self.first);
        head.iter_mut()
            .chain(wrapped.iter_mut())
            .filter_map(Option::as_mut)
    }

    /// Consume the buffer into a vector, oldest-first
    pub fn into_vec(mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.pop_oldest() {
            items.push(item);
        }
        items
    }

    fn physical(&self, index: usize) -> usize {
        (self.first + index) % self.slots.len()
    }
}

impl<T> Default for CyclicBuffer<T> {
    fn default() -> Self {
        Self::with_slots(0)
    }
}

impl<T: fmt::Debug> fmt::Debug for CyclicBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclicBuffer")
            .field("max_size", &self.max_size())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
