//! Fixed-capacity, thread-safe pipelines for handing items between threads.
//!
//! A [`Pipeline`] is a bounded FIFO guarded by a single lock, with separate
//! wait conditions for producers (space available) and consumers (data
//! available). What happens when a push meets a full buffer is decided per
//! pipeline by its [`Overflow`] policy: block, evict the oldest item, or fail.
//!
//! Closing a pipeline is permanent. Pushes then fail fast, while pulls keep
//! draining whatever was already buffered before reporting the end.
//!
//! On unix, [`NotifyPipeline`] additionally keeps a pollable descriptor
//! readable exactly while items are buffered, so a pipeline can sit in a
//! `poll`/`epoll` loop next to sockets.
//!
//! ```
//! use fibre_pipeline::Pipeline;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let pipeline = Arc::new(Pipeline::new(2).unwrap());
//! let producer = pipeline.clone();
//! let handle = thread::spawn(move || {
//!   for i in 0..5 {
//!     producer.push(i).unwrap();
//!   }
//!   producer.close().unwrap();
//! });
//!
//! let received: Vec<i32> = pipeline.iter().collect();
//! assert_eq!(received, vec![0, 1, 2, 3, 4]);
//! handle.join().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod overflow;

mod pipeline;
mod ring;

#[cfg(unix)]
pub mod notify;

pub use config::{PipelineBuilder, PipelineConfig};
pub use error::{CloseError, ConfigError, PullTimeoutError, PushError, PushTimeoutError, TryPullError};
pub use overflow::{EvictFn, Overflow, OverflowKind};
pub use pipeline::{Iter, Pipeline};

#[cfg(unix)]
pub use notify::{NotifyPipeline, Readable, ReadySignal};
