//! The bounded pipeline: a fixed-capacity FIFO shared between producer and
//! consumer threads.
//!
//! All queue state (the ring buffer and the `closed` flag) lives in one
//! `parking_lot::Mutex`. Producers blocked on a full buffer wait on the
//! `space` condvar, consumers blocked on an empty buffer wait on `data`.
//! Closing is monotonic: it wakes every waiter, makes pushes fail fast and
//! lets pulls drain whatever is still buffered.

use crate::config::{PipelineBuilder, PipelineConfig};
use crate::error::{
  CloseError, ConfigError, PullTimeoutError, PushError, PushTimeoutError, TryPullError,
};
use crate::overflow::Overflow;
use crate::ring::Ring;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};


/// Observer of empty/non-empty transitions.
///
/// Called with the pipeline's lock held, so implementations must not touch
/// the pipeline.
pub(crate) trait ReadinessHook: Send + Sync {
  /// `count` went from 0 to 1.
  fn raise(&self);
  /// `count` went to 0.
  fn lower(&self);
  /// The pipeline transitioned to closed.
  fn closed(&self);
}

pub(crate) struct State<T> {
  pub(crate) ring: Ring<T>,
  pub(crate) closed: bool,
}

/// A fixed-capacity, thread-safe FIFO queue.
///
/// Share it between threads with an `Arc`. See [`Overflow`] for what happens
/// when a push meets a full buffer.
pub struct Pipeline<T> {
  state: Mutex<State<T>>,
  /// Signaled when space becomes available.
  space: Condvar,
  /// Signaled when an item becomes available.
  data: Condvar,
  /// Mirror of `State::closed` for fast-path checks. Always re-validated
  /// under the lock.
  closed_hint: AtomicBool,
  capacity: usize,
  overflow: Overflow<T>,
  hook: Option<Arc<dyn ReadinessHook>>,
}

// Outcome of a push attempt made under the lock.
enum Stored<T> {
  Done,
  // Stored after evicting the head; the evicted item is handed back so the
  // callback can run without the lock.
  Evicted(T),
  // Full under `Block`; the caller should wait for space.
  Wait(T),
  Full(T),
  Closed(T),
}

impl<T> Pipeline<T> {
  /// Creates an open, empty pipeline using the [`Overflow::Block`] policy.
  ///
  /// # Errors
  ///
  /// `ConfigError::ZeroCapacity` if `capacity` is zero.
  pub fn new(capacity: usize) -> Result<Self, ConfigError> {
    Self::with_overflow(capacity, Overflow::Block)
  }

  /// Creates an open, empty pipeline with the given overflow policy.
  pub fn with_overflow(capacity: usize, overflow: Overflow<T>) -> Result<Self, ConfigError> {
    Self::build(capacity, overflow, None)
  }

  /// Creates a pipeline from a deserializable configuration.
  pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
    Self::with_overflow(config.capacity, config.overflow.into())
  }

  /// Starts a [`PipelineBuilder`] for a pipeline of the given capacity.
  pub fn builder(capacity: usize) -> PipelineBuilder<T> {
    PipelineBuilder::new(capacity)
  }

  pub(crate) fn build(
    capacity: usize,
    overflow: Overflow<T>,
    hook: Option<Arc<dyn ReadinessHook>>,
  ) -> Result<Self, ConfigError> {
    if capacity == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    tracing::debug!(capacity, overflow = %overflow.kind(), notify = hook.is_some(), "pipeline created");
    Ok(Self {
      state: Mutex::new(State {
        ring: Ring::new(capacity),
        closed: false,
      }),
      space: Condvar::new(),
      data: Condvar::new(),
      closed_hint: AtomicBool::new(false),
      capacity,
      overflow,
      hook,
    })
  }

  // --- Push ---

  /// Pushes an item, applying the overflow policy if the pipeline is full.
  ///
  /// Under [`Overflow::Block`] this suspends the calling thread until space
  /// is available.
  ///
  /// # Errors
  ///
  /// - `Err(PushError::Closed(item))` if the pipeline is closed, or closes
  ///   while this call is waiting.
  /// - `Err(PushError::Full(item))` under [`Overflow::Fail`] when full.
  pub fn push(&self, item: T) -> Result<(), PushError<T>> {
    if self.closed_hint.load(Ordering::Acquire) {
      return Err(PushError::Closed(item));
    }
    let mut state = self.state.lock();
    let mut item = item;
    loop {
      match self.store(&mut state, item, true) {
        Stored::Done => return Ok(()),
        Stored::Evicted(evicted) => {
          drop(state);
          self.evicted(evicted);
          return Ok(());
        }
        Stored::Full(returned) => return Err(PushError::Full(returned)),
        Stored::Closed(returned) => return Err(PushError::Closed(returned)),
        Stored::Wait(returned) => {
          item = returned;
          self.space.wait(&mut state);
        }
      }
    }
  }

  /// Pushes an item without ever blocking.
  ///
  /// A full pipeline yields `PushError::Full` under both `Block` and `Fail`;
  /// under `DropOldest` the oldest item is evicted as with `push`.
  pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
    if self.closed_hint.load(Ordering::Acquire) {
      return Err(PushError::Closed(item));
    }
    let mut state = self.state.lock();
    match self.store(&mut state, item, false) {
      Stored::Done => Ok(()),
      Stored::Evicted(evicted) => {
        drop(state);
        self.evicted(evicted);
        Ok(())
      }
      Stored::Wait(returned) | Stored::Full(returned) => Err(PushError::Full(returned)),
      Stored::Closed(returned) => Err(PushError::Closed(returned)),
    }
  }

  /// Like [`push`](Self::push), but a `Block`-policy wait gives up once
  /// `timeout` has elapsed.
  ///
  /// # Errors
  ///
  /// `Timeout(item)` is distinct from `Closed(item)`: the pipeline is still
  /// open after a timeout.
  pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), PushTimeoutError<T>> {
    if self.closed_hint.load(Ordering::Acquire) {
      return Err(PushTimeoutError::Closed(item));
    }
    // A deadline past the clock's range means waiting without one.
    let deadline = Instant::now().checked_add(timeout);
    let mut state = self.state.lock();
    let mut item = item;
    loop {
      match self.store(&mut state, item, true) {
        Stored::Done => return Ok(()),
        Stored::Evicted(evicted) => {
          drop(state);
          self.evicted(evicted);
          return Ok(());
        }
        Stored::Full(returned) => return Err(PushTimeoutError::Full(returned)),
        Stored::Closed(returned) => return Err(PushTimeoutError::Closed(returned)),
        Stored::Wait(returned) => {
          let Some(deadline) = deadline else {
            item = returned;
            self.space.wait(&mut state);
            continue;
          };
          if self.space.wait_until(&mut state, deadline).timed_out() {
            // One last look: space may have freed up right at the deadline.
            return match self.store(&mut state, returned, false) {
              Stored::Done => Ok(()),
              Stored::Evicted(evicted) => {
                drop(state);
                self.evicted(evicted);
                Ok(())
              }
              Stored::Closed(returned) => Err(PushTimeoutError::Closed(returned)),
              Stored::Wait(returned) | Stored::Full(returned) => {
                Err(PushTimeoutError::Timeout(returned))
              }
            };
          }
          item = returned;
        }
      }
    }
  }

  // Shared push-success path, then the overflow policy when full. With
  // `may_wait` false the `Block` policy reports `Full` instead of `Wait`.
  fn store(&self, state: &mut MutexGuard<'_, State<T>>, item: T, may_wait: bool) -> Stored<T> {
    if state.closed {
      return Stored::Closed(item);
    }
    if !state.ring.is_full() {
      let was_empty = state.ring.is_empty();
      state.ring.push_back(item);
      self.data.notify_one();
      if was_empty {
        self.raise();
      }
      return Stored::Done;
    }
    match &self.overflow {
      Overflow::Block if may_wait => Stored::Wait(item),
      Overflow::Block | Overflow::Fail => Stored::Full(item),
      Overflow::DropOldest { .. } => {
        // Count stays at capacity across the swap, so neither the consumers
        // nor the readiness signal see a transition, and no producer is woken.
        match state.ring.pop_front() {
          Some(evicted) => {
            state.ring.push_back(item);
            Stored::Evicted(evicted)
          }
          None => Stored::Full(item),
        }
      }
    }
  }

  fn evicted(&self, item: T) {
    tracing::trace!(capacity = self.capacity, "pipeline full, evicted oldest item");
    if let Overflow::DropOldest {
      on_evict: Some(on_evict),
    } = &self.overflow
    {
      on_evict(item);
    }
  }

  // --- Pull ---

  /// Pulls the oldest item, blocking while the pipeline is empty and open.
  ///
  /// Returns `None` once the pipeline is closed and every buffered item has
  /// been pulled.
  pub fn pull(&self) -> Option<T> {
    let mut state = self.state.lock();
    loop {
      if let Some(item) = self.take(&mut state) {
        return Some(item);
      }
      if state.closed {
        return None;
      }
      self.data.wait(&mut state);
    }
  }

  /// Pulls the oldest item without blocking.
  ///
  /// # Errors
  ///
  /// - `TryPullError::Empty` if nothing is buffered and the pipeline is open.
  /// - `TryPullError::Closed` if the pipeline is closed and drained.
  pub fn try_pull(&self) -> Result<T, TryPullError> {
    let mut state = self.state.lock();
    match self.take(&mut state) {
      Some(item) => Ok(item),
      None if state.closed => Err(TryPullError::Closed),
      None => Err(TryPullError::Empty),
    }
  }

  /// Like [`pull`](Self::pull), but gives up once `timeout` has elapsed.
  pub fn pull_timeout(&self, timeout: Duration) -> Result<T, PullTimeoutError> {
    let deadline = Instant::now().checked_add(timeout);
    let mut state = self.state.lock();
    loop {
      if let Some(item) = self.take(&mut state) {
        return Ok(item);
      }
      if state.closed {
        return Err(PullTimeoutError::Closed);
      }
      let Some(deadline) = deadline else {
        self.data.wait(&mut state);
        continue;
      };
      if self.data.wait_until(&mut state, deadline).timed_out() {
        return match self.take(&mut state) {
          Some(item) => Ok(item),
          None if state.closed => Err(PullTimeoutError::Closed),
          None => Err(PullTimeoutError::Timeout),
        };
      }
    }
  }

  /// Returns a blocking iterator that pulls until the pipeline is closed and
  /// drained.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter { pipeline: self }
  }

  // Removes the head item, waking one producer and lowering readiness when
  // the buffer empties.
  fn take(&self, state: &mut MutexGuard<'_, State<T>>) -> Option<T> {
    let item = state.ring.pop_front()?;
    self.space.notify_one();
    if state.ring.is_empty() {
      self.lower();
    }
    Some(item)
  }

  // --- Inspection and removal ---

  /// Calls `visitor` on the oldest item without removing it.
  ///
  /// Returns `false`, without calling `visitor`, if the pipeline is empty.
  /// The lock is held while `visitor` runs.
  pub fn try_peek<F>(&self, visitor: F) -> bool
  where
    F: FnOnce(&T),
  {
    let state = self.state.lock();
    match state.ring.front() {
      Some(item) => {
        visitor(item);
        true
      }
      None => false,
    }
  }

  /// Removes the oldest item if, and only if, the pipeline is at capacity.
  ///
  /// Returns whether an item was removed.
  pub fn drop_head(&self) -> bool {
    let mut state = self.state.lock();
    if !state.ring.is_full() {
      return false;
    }
    let removed = self.take(&mut state);
    drop(state);
    removed.is_some()
  }

  /// Removes every buffered item.
  ///
  /// Items are dropped after the lock is released.
  pub fn clear(&self) {
    let mut state = self.state.lock();
    let drained = self.clear_locked(&mut state);
    drop(state);
    drop(drained);
  }

  fn clear_locked(&self, state: &mut MutexGuard<'_, State<T>>) -> Vec<T> {
    let drained = state.ring.drain();
    if !drained.is_empty() {
      self.lower();
      if !state.closed {
        self.space.notify_all();
      }
    }
    drained
  }

  // --- Close/drain state machine ---

  /// Closes the pipeline.
  ///
  /// Every blocked producer and consumer is woken. Further pushes fail with
  /// `Closed`; pulls keep returning buffered items until none remain.
  ///
  /// # Errors
  ///
  /// `CloseError` if the pipeline was already closed. Nothing changes in
  /// that case.
  pub fn close(&self) -> Result<(), CloseError> {
    let mut state = self.state.lock();
    self.close_locked(&mut state)
  }

  /// Closes the pipeline and drops every buffered item.
  ///
  /// Returns the number of items dropped. Works on an already closed
  /// pipeline too, releasing whatever was left undrained.
  pub fn abort(&self) -> usize {
    let mut state = self.state.lock();
    let _ = self.close_locked(&mut state);
    let drained = self.clear_locked(&mut state);
    drop(state);
    let dropped = drained.len();
    tracing::debug!(dropped, "pipeline aborted");
    dropped
  }

  fn close_locked(&self, state: &mut MutexGuard<'_, State<T>>) -> Result<(), CloseError> {
    if state.closed {
      return Err(CloseError);
    }
    state.closed = true;
    self.closed_hint.store(true, Ordering::Release);
    self.data.notify_all();
    self.space.notify_all();
    if let Some(hook) = &self.hook {
      hook.closed();
    }
    tracing::debug!(remaining = state.ring.len(), "pipeline closed");
    Ok(())
  }

  // --- Point-in-time reads ---

  /// Returns the number of buffered items.
  pub fn count(&self) -> usize {
    self.state.lock().ring.len()
  }

  /// Alias of [`count`](Self::count).
  #[inline]
  pub fn len(&self) -> usize {
    self.count()
  }

  pub fn is_empty(&self) -> bool {
    self.state.lock().ring.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.state.lock().ring.is_full()
  }

  /// Returns the fixed capacity chosen at construction.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Returns `true` until the pipeline is closed.
  pub fn is_open(&self) -> bool {
    !self.closed_hint.load(Ordering::Acquire)
  }

  /// Returns the overflow policy this pipeline was built with.
  pub fn overflow(&self) -> &Overflow<T> {
    &self.overflow
  }

  pub(crate) fn lock_state(&self) -> MutexGuard<'_, State<T>> {
    self.state.lock()
  }

  #[inline]
  fn raise(&self) {
    if let Some(hook) = &self.hook {
      hook.raise();
    }
  }

  #[inline]
  fn lower(&self) {
    if let Some(hook) = &self.hook {
      hook.lower();
    }
  }
}

impl<T> fmt::Debug for Pipeline<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("Pipeline")
      .field("capacity", &self.capacity)
      .field("count", &state.ring.len())
      .field("closed", &state.closed)
      .field("overflow", &self.overflow)
      .finish()
  }
}

/// Blocking iterator over a pipeline's items. See [`Pipeline::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
  pipeline: &'a Pipeline<T>,
}

impl<T> Iterator for Iter<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.pipeline.pull()
  }
}

impl<'a, T> IntoIterator for &'a Pipeline<T> {
  type Item = T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Iter<'a, T> {
    self.iter()
  }
}
