//! # podtrace-core
//!
//! Correlates kernel events with the container that produced them and
//! appends them to one log file per container.
//!
//! - [`SinkTable`](sink::SinkTable): container key to open log sink, the
//!   single synchronization point between the two concurrency domains.
//! - [`LifecycleHandler`](lifecycle::LifecycleHandler): opens sinks on
//!   container add; drains syscall history and closes them on remove.
//! - [`EventRouter`](router::EventRouter): shared entry point for the
//!   exec, open, TCP and syscall producers.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod format;
pub mod lifecycle;
pub mod logs;
pub mod router;
pub mod sink;

pub use crate::lifecycle::{LifecycleHandler, LifecycleOutcome};
pub use crate::router::{EventRouter, RouteOutcome, RouterStats};
pub use crate::sink::{Append, LogSink, SinkEntry, SinkTable};
