//! # podtrace-events
//!
//! The vocabulary shared with the collaborators that surround the agent
//! core:
//! - **Kernel events**: exec, file open, TCP activity, and syscalls, each
//!   tagged with the container that produced it.
//! - **Lifecycle notifications**: container added / removed.
//! - **Syscall history**: the [`SyscallSnapshotSource`](snapshot::SyscallSnapshotSource)
//!   seam read once when a container goes away.
//! - **Feed records**: the newline-delimited JSON form of all of the above.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod container;
pub mod exec;
pub mod feed;
pub mod file;
pub mod net;
pub mod snapshot;
pub mod syscall;

use podtrace_common::types::ContainerKey;
use serde::{Deserialize, Serialize};

pub use crate::exec::ExecEvent;
pub use crate::file::OpenEvent;
pub use crate::net::TcpEvent;
pub use crate::syscall::SyscallEvent;

/// The kernel event source an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Process execution tracer.
    Exec,
    /// File open tracer.
    Open,
    /// TCP connect/accept/close tracer.
    Tcp,
    /// Syscall tracer.
    Syscall,
}

impl EventSource {
    /// All sources, in producer order.
    pub const ALL: [Self; 4] = [Self::Exec, Self::Open, Self::Tcp, Self::Syscall];

    /// Name of the tracer attached for this source.
    #[must_use]
    pub const fn tracer_name(self) -> &'static str {
        match self {
            Self::Exec => "trace_exec",
            Self::Open => "trace_open",
            Self::Tcp => "trace_tcp",
            Self::Syscall => "trace_syscall",
        }
    }
}

/// A kernel event from any of the four sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelEvent {
    /// A process was executed.
    Exec(ExecEvent),
    /// A file was opened.
    Open(OpenEvent),
    /// TCP activity was observed.
    Tcp(TcpEvent),
    /// A syscall was observed.
    Syscall(SyscallEvent),
}

impl KernelEvent {
    /// Container that produced the event.
    #[must_use]
    pub const fn key(&self) -> &ContainerKey {
        match self {
            Self::Exec(e) => &e.key,
            Self::Open(e) => &e.key,
            Self::Tcp(e) => &e.key,
            Self::Syscall(e) => &e.key,
        }
    }

    /// Source the event came from.
    #[must_use]
    pub const fn source(&self) -> EventSource {
        match self {
            Self::Exec(_) => EventSource::Exec,
            Self::Open(_) => EventSource::Open,
            Self::Tcp(_) => EventSource::Tcp,
            Self::Syscall(_) => EventSource::Syscall,
        }
    }
}

impl From<ExecEvent> for KernelEvent {
    fn from(event: ExecEvent) -> Self {
        Self::Exec(event)
    }
}

impl From<OpenEvent> for KernelEvent {
    fn from(event: OpenEvent) -> Self {
        Self::Open(event)
    }
}

impl From<TcpEvent> for KernelEvent {
    fn from(event: TcpEvent) -> Self {
        Self::Tcp(event)
    }
}

impl From<SyscallEvent> for KernelEvent {
    fn from(event: SyscallEvent) -> Self {
        Self::Syscall(event)
    }
}
