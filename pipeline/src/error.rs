// src/error.rs

use core::fmt;
use std::io;

use thiserror::Error;

// Generates `into_inner`, `Display`, a redacting `Debug` and `Error` for enums
// whose every variant hands the rejected item back to the caller.
macro_rules! impl_error_for_enum_with_inner {
  (
    $enum_name:ident < $generic_param:ident >,
    $($variant:ident ( $message:expr ) ),+
    $(,)?
  ) => {
    impl<$generic_param> $enum_name<$generic_param> {
      /// Consumes the error, returning the item that could not be pushed.
      #[inline]
      pub fn into_inner(self) -> $generic_param {
        match self {
          $( $enum_name::$variant(v) => v, )+
        }
      }
    }

    impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $( $enum_name::$variant(_) => f.write_str($message), )+
        }
      }
    }

    impl<$generic_param> fmt::Debug for $enum_name<$generic_param> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $( $enum_name::$variant(_) => write!(f, concat!(stringify!($enum_name), "::", stringify!($variant), "(..)")), )+
        }
      }
    }

    impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
  };
}

/// Error returned when a pipeline cannot be constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A pipeline must be able to hold at least one item.
  #[error("pipeline capacity must be greater than zero")]
  ZeroCapacity,

  /// The readiness signal backing a `NotifyPipeline` could not be created.
  #[error("failed to create readiness signal: {0}")]
  Signal(#[from] io::Error),
}

/// Error returned by `push` and `try_push`. The rejected item is returned.
#[derive(PartialEq, Eq, Clone)]
pub enum PushError<T> {
  /// The pipeline is at capacity and the overflow policy refused the item.
  Full(T),
  /// The pipeline has been closed.
  Closed(T),
}

impl_error_for_enum_with_inner!(
  PushError<T>,
  Full("pipeline full"),
  Closed("pipeline closed"),
);

impl<T> PushError<T> {
  /// Returns `true` if the push was refused because the pipeline was full.
  #[inline]
  pub fn is_full(&self) -> bool {
    matches!(self, PushError::Full(_))
  }

  /// Returns `true` if the push was refused because the pipeline was closed.
  #[inline]
  pub fn is_closed(&self) -> bool {
    matches!(self, PushError::Closed(_))
  }
}

/// Error returned by `push_timeout`. The rejected item is returned.
#[derive(PartialEq, Eq, Clone)]
pub enum PushTimeoutError<T> {
  /// The pipeline is at capacity and the overflow policy refused the item.
  Full(T),
  /// The pipeline was closed before or while waiting for space.
  Closed(T),
  /// The timeout elapsed before space became available.
  Timeout(T),
}

impl_error_for_enum_with_inner!(
  PushTimeoutError<T>,
  Full("pipeline full"),
  Closed("pipeline closed"),
  Timeout("push operation timed out"),
);

impl<T> From<PushError<T>> for PushTimeoutError<T> {
  fn from(err: PushError<T>) -> Self {
    match err {
      PushError::Full(item) => PushTimeoutError::Full(item),
      PushError::Closed(item) => PushTimeoutError::Closed(item),
    }
  }
}

/// Error returned by `try_pull` when no item could be taken immediately.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum TryPullError {
  #[error("pipeline empty")]
  Empty,
  /// The pipeline is closed and every buffered item has been drained.
  #[error("pipeline closed and drained")]
  Closed,
}

/// Error returned by `pull_timeout`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum PullTimeoutError {
  /// The pipeline is closed and every buffered item has been drained.
  #[error("pipeline closed and drained")]
  Closed,
  /// The timeout elapsed before an item became available.
  #[error("pull operation timed out")]
  Timeout,
}

/// Error returned when attempting to close an already closed pipeline.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
#[error("pipeline is already closed")]
pub struct CloseError;
