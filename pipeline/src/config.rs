//! Construction-time configuration for pipelines.
//!
//! [`PipelineConfig`] is the plain-data form, deserializable with the `serde`
//! feature. [`PipelineBuilder`] is the fluent form, and is the only way to
//! attach an eviction callback.

use crate::error::ConfigError;
use crate::overflow::{Overflow, OverflowKind};
use crate::pipeline::Pipeline;

#[cfg(unix)]
use crate::notify::NotifyPipeline;

/// Plain-data pipeline configuration.
///
/// With the `serde` feature enabled this deserializes from, for example:
///
/// ```yaml
/// capacity: 64
/// overflow: drop_oldest
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct PipelineConfig {
  pub capacity: usize,
  #[cfg_attr(feature = "serde", serde(default))]
  pub overflow: OverflowKind,
}

impl PipelineConfig {
  pub fn new(capacity: usize, overflow: OverflowKind) -> Self {
    Self { capacity, overflow }
  }

  /// Checks the configuration without building anything.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.capacity == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    Ok(())
  }
}

/// Fluent builder for [`Pipeline`] and [`NotifyPipeline`].
///
/// ```
/// use fibre_pipeline::Pipeline;
///
/// let pipeline = Pipeline::<u32>::builder(4)
///   .drop_oldest()
///   .on_evict(|item| eprintln!("evicted {item}"))
///   .build()
///   .unwrap();
/// assert_eq!(pipeline.capacity(), 4);
/// ```
pub struct PipelineBuilder<T> {
  capacity: usize,
  overflow: Overflow<T>,
}

impl<T> PipelineBuilder<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      overflow: Overflow::Block,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self {
      capacity: config.capacity,
      overflow: config.overflow.into(),
    }
  }

  pub fn overflow(mut self, overflow: Overflow<T>) -> Self {
    self.overflow = overflow;
    self
  }

  /// Producers wait for space when full. This is the default.
  pub fn block(self) -> Self {
    self.overflow(Overflow::Block)
  }

  /// Full pipelines evict their oldest item to make room.
  pub fn drop_oldest(self) -> Self {
    self.overflow(Overflow::drop_oldest())
  }

  /// Full pipelines refuse new items with `PushError::Full`.
  pub fn fail_when_full(self) -> Self {
    self.overflow(Overflow::Fail)
  }

  /// Reports evicted items to `on_evict`. Switches the policy to
  /// `DropOldest` if it was anything else.
  pub fn on_evict<F>(self, on_evict: F) -> Self
  where
    F: Fn(T) + Send + Sync + 'static,
  {
    self.overflow(Overflow::drop_oldest_with(on_evict))
  }

  pub fn build(self) -> Result<Pipeline<T>, ConfigError> {
    Pipeline::with_overflow(self.capacity, self.overflow)
  }

  /// Builds a pipeline that also drives a pollable readiness signal.
  #[cfg(unix)]
  pub fn build_notify(self) -> Result<NotifyPipeline<T>, ConfigError> {
    NotifyPipeline::with_overflow(self.capacity, self.overflow)
  }
}

impl<T> std::fmt::Debug for PipelineBuilder<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineBuilder")
      .field("capacity", &self.capacity)
      .field("overflow", &self.overflow)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::PushError;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn zero_capacity_is_rejected() {
    assert!(matches!(
      Pipeline::<u8>::builder(0).build(),
      Err(ConfigError::ZeroCapacity)
    ));
    assert!(PipelineConfig::new(0, OverflowKind::Fail).validate().is_err());
  }

  #[test]
  fn builder_applies_policy() {
    let pipeline = Pipeline::builder(1).fail_when_full().build().unwrap();
    pipeline.push(1).unwrap();
    assert_eq!(pipeline.push(2), Err(PushError::Full(2)));
    assert_eq!(pipeline.overflow().kind(), OverflowKind::Fail);
  }

  #[test]
  fn on_evict_implies_drop_oldest() {
    let evicted = Arc::new(AtomicUsize::new(0));
    let seen = evicted.clone();
    let pipeline = Pipeline::builder(1)
      .on_evict(move |item: usize| {
        seen.fetch_add(item, Ordering::SeqCst);
      })
      .build()
      .unwrap();
    pipeline.push(7).unwrap();
    pipeline.push(8).unwrap();
    assert_eq!(evicted.load(Ordering::SeqCst), 7);
    assert_eq!(pipeline.pull(), Some(8));
  }

  #[test]
  fn from_config_uses_kind() {
    let config = PipelineConfig::new(3, OverflowKind::DropOldest);
    let pipeline = PipelineBuilder::<u8>::from_config(&config).build().unwrap();
    assert_eq!(pipeline.capacity(), 3);
    assert_eq!(pipeline.overflow().kind(), OverflowKind::DropOldest);
  }
}
