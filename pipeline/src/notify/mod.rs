//! A pipeline that mirrors "has items" onto a pollable readiness signal.
//!
//! [`NotifyPipeline`] behaves exactly like [`Pipeline`] (and derefs to it),
//! and additionally keeps a [`ReadySignal`] set if and only if at least one
//! item is buffered. The signal is raised and cleared inside the same
//! critical section that moves the count across zero, so a poller never sees
//! readiness that disagrees with a push or pull that has already returned.
//!
//! ```no_run
//! use fibre_pipeline::NotifyPipeline;
//! use std::os::fd::AsRawFd;
//! use std::time::Duration;
//!
//! let pipeline = NotifyPipeline::new(16).unwrap();
//! let fd = pipeline.as_raw_fd(); // register with poll/epoll next to sockets
//! pipeline.push("work").unwrap();
//! assert!(pipeline.wait_ready(Duration::from_millis(10)).unwrap());
//! assert_eq!(pipeline.pull(), Some("work"));
//! # let _ = fd;
//! ```

mod signal;

pub use signal::ReadySignal;

use crate::error::ConfigError;
use crate::overflow::Overflow;
use crate::pipeline::{Pipeline, ReadinessHook};

use std::fmt;
use std::future::Future;
use std::io;
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::task::AtomicWaker;

struct Readiness {
  signal: ReadySignal,
  waker: AtomicWaker,
}

impl ReadinessHook for Readiness {
  fn raise(&self) {
    if let Err(err) = self.signal.signal() {
      tracing::warn!(error = %err, "failed to raise pipeline readiness signal");
    }
    self.waker.wake();
  }

  fn lower(&self) {
    if let Err(err) = self.signal.clear() {
      tracing::warn!(error = %err, "failed to clear pipeline readiness signal");
    }
  }

  fn closed(&self) {
    self.waker.wake();
  }
}

/// A [`Pipeline`] whose non-empty state is observable through a file
/// descriptor.
pub struct NotifyPipeline<T> {
  pipeline: Pipeline<T>,
  readiness: Arc<Readiness>,
}

impl<T> NotifyPipeline<T> {
  /// Creates a notifying pipeline with the [`Overflow::Block`] policy.
  ///
  /// # Errors
  ///
  /// - `ConfigError::ZeroCapacity` if `capacity` is zero.
  /// - `ConfigError::Signal` if the readiness descriptor cannot be created.
  pub fn new(capacity: usize) -> Result<Self, ConfigError> {
    Self::with_overflow(capacity, Overflow::Block)
  }

  pub fn with_overflow(capacity: usize, overflow: Overflow<T>) -> Result<Self, ConfigError> {
    if capacity == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    let readiness = Arc::new(Readiness {
      signal: ReadySignal::new()?,
      waker: AtomicWaker::new(),
    });
    let hook: Arc<dyn ReadinessHook> = readiness.clone();
    let pipeline = Pipeline::build(capacity, overflow, Some(hook))?;
    Ok(Self {
      pipeline,
      readiness,
    })
  }

  /// The pollable descriptor. It is readable while items are buffered.
  pub fn readiness_handle(&self) -> BorrowedFd<'_> {
    self.readiness.signal.as_fd()
  }

  /// Blocks until an item is buffered or `timeout` elapses.
  ///
  /// Returns whether the pipeline had items when the wait ended. Another
  /// consumer may still pull the item first.
  pub fn wait_ready(&self, timeout: Duration) -> io::Result<bool> {
    self.readiness.signal.wait(Some(timeout))
  }

  /// Returns a future that resolves to `true` once an item is buffered, or
  /// to `false` once the pipeline is closed and drained.
  ///
  /// Only one task can be registered at a time; a newer `Readable` replaces
  /// the waker of an older one.
  pub fn readable(&self) -> Readable<'_, T> {
    Readable { pipeline: self }
  }

  /// Samples the item count and the signal state under the pipeline's lock.
  pub fn snapshot(&self) -> io::Result<(usize, bool)> {
    let state = self.pipeline.lock_state();
    let signaled = self.readiness.signal.is_signaled()?;
    Ok((state.ring.len(), signaled))
  }

  /// The underlying pipeline.
  pub fn as_pipeline(&self) -> &Pipeline<T> {
    &self.pipeline
  }
}

impl<T> Deref for NotifyPipeline<T> {
  type Target = Pipeline<T>;

  fn deref(&self) -> &Pipeline<T> {
    &self.pipeline
  }
}

impl<T> AsFd for NotifyPipeline<T> {
  fn as_fd(&self) -> BorrowedFd<'_> {
    self.readiness_handle()
  }
}

impl<T> AsRawFd for NotifyPipeline<T> {
  fn as_raw_fd(&self) -> RawFd {
    self.readiness.signal.as_raw_fd()
  }
}

impl<T> fmt::Debug for NotifyPipeline<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NotifyPipeline")
      .field("pipeline", &self.pipeline)
      .field("fd", &self.as_raw_fd())
      .finish()
  }
}

/// Future returned by [`NotifyPipeline::readable`].
#[must_use = "futures do nothing unless polled"]
pub struct Readable<'a, T> {
  pipeline: &'a NotifyPipeline<T>,
}

impl<T> Future for Readable<'_, T> {
  type Output = bool;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
    let notify = self.pipeline;
    // Register before checking so a push racing this poll still wakes us.
    notify.readiness.waker.register(cx.waker());
    let state = notify.pipeline.lock_state();
    if !state.ring.is_empty() {
      Poll::Ready(true)
    } else if state.closed {
      Poll::Ready(false)
    } else {
      Poll::Pending
    }
  }
}

impl<T> fmt::Debug for Readable<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Readable").finish_non_exhaustive()
  }
}
