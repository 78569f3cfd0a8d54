//! Fixed-capacity circular storage used by the pipeline.
//!
//! `Ring` has no synchronization of its own; the pipeline keeps it inside its
//! mutex-guarded state. Slots are `Option<T>` so a pulled or evicted item is
//! moved out and the vacated slot holds nothing.

pub(crate) struct Ring<T> {
  slots: Box<[Option<T>]>,
  head: usize,
  tail: usize,
  len: usize,
}

impl<T> Ring<T> {
  /// Creates an empty ring. Callers guarantee `capacity > 0`.
  pub(crate) fn new(capacity: usize) -> Self {
    debug_assert!(capacity > 0, "ring capacity must be positive");
    Self {
      slots: (0..capacity).map(|_| None).collect(),
      head: 0,
      tail: 0,
      len: 0,
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.len == self.slots.len()
  }

  /// Stores `item` at `tail`. The ring must not be full.
  pub(crate) fn push_back(&mut self, item: T) {
    debug_assert!(!self.is_full(), "push_back on a full ring");
    self.slots[self.tail] = Some(item);
    self.tail = (self.tail + 1) % self.slots.len();
    self.len += 1;
  }

  /// Moves the item at `head` out of the ring.
  pub(crate) fn pop_front(&mut self) -> Option<T> {
    if self.len == 0 {
      return None;
    }
    let item = self.slots[self.head].take();
    self.head = (self.head + 1) % self.slots.len();
    self.len -= 1;
    item
  }

  pub(crate) fn front(&self) -> Option<&T> {
    if self.len == 0 {
      return None;
    }
    self.slots[self.head].as_ref()
  }

  /// Removes every item, returning them in FIFO order.
  pub(crate) fn drain(&mut self) -> Vec<T> {
    let mut drained = Vec::with_capacity(self.len);
    while let Some(item) = self.pop_front() {
      drained.push(item);
    }
    drained
  }
}
