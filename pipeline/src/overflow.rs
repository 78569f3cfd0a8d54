//! Overflow policies: what `push` does when it finds the pipeline full.

use std::fmt;

/// Callback receiving items evicted by [`Overflow::DropOldest`].
pub type EvictFn<T> = Box<dyn Fn(T) + Send + Sync>;

/// The strategy applied when a push meets a full buffer.
///
/// The policy is chosen once per pipeline and matched inside `push` while the
/// pipeline's lock is held.
pub enum Overflow<T> {
  /// Suspend the producer until space frees up or the pipeline closes.
  Block,
  /// Evict the oldest buffered item to make room. Never blocks.
  ///
  /// The evicted item is passed to `on_evict` if one is set, otherwise it is
  /// dropped. The callback runs after the pipeline's lock has been released.
  DropOldest { on_evict: Option<EvictFn<T>> },
  /// Refuse the item with `PushError::Full`. Never blocks.
  Fail,
}

impl<T> Overflow<T> {
  /// `DropOldest` without an eviction callback.
  pub fn drop_oldest() -> Self {
    Overflow::DropOldest { on_evict: None }
  }

  /// `DropOldest` reporting every evicted item to `on_evict`.
  pub fn drop_oldest_with<F>(on_evict: F) -> Self
  where
    F: Fn(T) + Send + Sync + 'static,
  {
    Overflow::DropOldest {
      on_evict: Some(Box::new(on_evict)),
    }
  }

  /// The configuration-level kind of this policy.
  pub fn kind(&self) -> OverflowKind {
    match self {
      Overflow::Block => OverflowKind::Block,
      Overflow::DropOldest { .. } => OverflowKind::DropOldest,
      Overflow::Fail => OverflowKind::Fail,
    }
  }
}

impl<T> Default for Overflow<T> {
  fn default() -> Self {
    Overflow::Block
  }
}

impl<T> fmt::Debug for Overflow<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Overflow::Block => f.write_str("Block"),
      Overflow::DropOldest { on_evict } => f
        .debug_struct("DropOldest")
        .field("on_evict", &on_evict.is_some())
        .finish(),
      Overflow::Fail => f.write_str("Fail"),
    }
  }
}

impl<T> From<OverflowKind> for Overflow<T> {
  fn from(kind: OverflowKind) -> Self {
    match kind {
      OverflowKind::Block => Overflow::Block,
      OverflowKind::DropOldest => Overflow::drop_oldest(),
      OverflowKind::Fail => Overflow::Fail,
    }
  }
}

/// A payload-free overflow policy, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowKind {
  #[default]
  Block,
  DropOldest,
  Fail,
}

impl fmt::Display for OverflowKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverflowKind::Block => f.write_str("block"),
      OverflowKind::DropOldest => f.write_str("drop_oldest"),
      OverflowKind::Fail => f.write_str("fail"),
    }
  }
}
