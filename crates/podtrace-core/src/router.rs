//! Routes kernel events from concurrent producers to container sinks.
//!
//! Every producer (one per tracer) holds a clone of the same
//! `Arc<EventRouter>` and calls it from its own thread. Nothing here
//! blocks except the file write itself; a slow log filesystem stalls only
//! the producer whose line is being written, and other producers writing
//! to the same sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use podtrace_common::constants::DEFAULT_MISS_LOG_INTERVAL;
use podtrace_common::types::{ContainerKey, SinkState};
use podtrace_events::{EventSource, ExecEvent, KernelEvent, OpenEvent, SyscallEvent, TcpEvent};

use crate::format;
use crate::sink::{Append, SinkTable};

/// What happened to one routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A line was appended to the container's sink.
    Written,
    /// The event reported a failed operation and is not logged.
    Filtered,
    /// No sink is registered for the container.
    Missed,
    /// The sink exists but no longer accepts routed lines.
    Dropped(SinkState),
    /// The write failed.
    Failed,
}

/// Counter snapshot of a router's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Lines written.
    pub written: u64,
    /// Failed exec/open events skipped.
    pub filtered: u64,
    /// Events with no registered sink.
    pub missed: u64,
    /// Events refused by a draining or closed sink.
    pub dropped: u64,
    /// Events lost to write errors.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    filtered: AtomicU64,
    missed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(&self, outcome: RouteOutcome) {
        let counter = match outcome {
            RouteOutcome::Written => &self.written,
            RouteOutcome::Filtered => &self.filtered,
            RouteOutcome::Missed => &self.missed,
            RouteOutcome::Dropped(_) => &self.dropped,
            RouteOutcome::Failed => &self.failed,
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            written: self.written.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Samples "container not found" logging so routine misses cannot flood
/// the agent's own log. The first miss and every `interval`-th one log at
/// `warn` with the running total; the rest log at `debug`.
#[derive(Debug)]
struct MissSampler {
    interval: u64,
    seen: AtomicU64,
}

impl MissSampler {
    fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            seen: AtomicU64::new(0),
        }
    }

    fn record(&self, key: &ContainerKey, source: EventSource) {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        if n == 1 || n % self.interval == 0 {
            tracing::warn!(
                namespace = key.namespace(),
                pod = key.pod(),
                container = key.container(),
                tracer = source.tracer_name(),
                total_misses = n,
                "container not found"
            );
        } else {
            tracing::debug!(container = %key, tracer = source.tracer_name(), "container not found");
        }
    }
}

/// Shared, thread-safe entry point for all event producers.
#[derive(Debug)]
pub struct EventRouter {
    table: Arc<SinkTable>,
    misses: MissSampler,
    counters: Counters,
}

impl EventRouter {
    /// Creates a router over `table` with the default miss log interval.
    #[must_use]
    pub fn new(table: Arc<SinkTable>) -> Self {
        Self::with_miss_log_interval(table, DEFAULT_MISS_LOG_INTERVAL)
    }

    /// Creates a router logging every `interval`-th routing miss at `warn`.
    #[must_use]
    pub fn with_miss_log_interval(table: Arc<SinkTable>, interval: u64) -> Self {
        Self {
            table,
            misses: MissSampler::new(interval),
            counters: Counters::default(),
        }
    }

    /// Routes one event to its container's sink.
    ///
    /// Never fails: misses, refusals and write errors are logged and the
    /// event is dropped.
    pub fn route(&self, event: &KernelEvent) -> RouteOutcome {
        let outcome = self.route_inner(event);
        self.counters.bump(outcome);
        outcome
    }

    /// Routes an exec event. Failed execs are filtered.
    pub fn route_exec(&self, event: ExecEvent) -> RouteOutcome {
        self.route(&KernelEvent::Exec(event))
    }

    /// Routes an open event. Failed opens are filtered.
    pub fn route_open(&self, event: OpenEvent) -> RouteOutcome {
        self.route(&KernelEvent::Open(event))
    }

    /// Routes a TCP event.
    pub fn route_tcp(&self, event: TcpEvent) -> RouteOutcome {
        self.route(&KernelEvent::Tcp(event))
    }

    /// Routes a syscall event.
    pub fn route_syscall(&self, event: SyscallEvent) -> RouteOutcome {
        self.route(&KernelEvent::Syscall(event))
    }

    /// Outcome counters so far.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    /// Table this router writes to.
    #[must_use]
    pub const fn table(&self) -> &Arc<SinkTable> {
        &self.table
    }

    fn route_inner(&self, event: &KernelEvent) -> RouteOutcome {
        let succeeded = match event {
            KernelEvent::Exec(e) => e.succeeded(),
            KernelEvent::Open(e) => e.succeeded(),
            KernelEvent::Tcp(_) | KernelEvent::Syscall(_) => true,
        };
        if !succeeded {
            return RouteOutcome::Filtered;
        }

        let key = event.key();
        let Some(entry) = self.table.lookup(key) else {
            self.misses.record(key, event.source());
            return RouteOutcome::Missed;
        };

        match entry.append(&format::event_line(event)) {
            Ok(Append::Written) => RouteOutcome::Written,
            Ok(Append::Refused(state)) => {
                tracing::debug!(container = %key, %state, "sink not accepting events, dropped");
                RouteOutcome::Dropped(state)
            }
            Err(e) => {
                tracing::warn!(container = %key, error = %e, "failed to write event");
                RouteOutcome::Failed
            }
        }
    }
}
