//! Buffered syscall history, read once when a container is removed.

use std::collections::HashMap;

use parking_lot::Mutex;
use podtrace_common::types::MountNsId;
use thiserror::Error;

/// Failure to fetch a syscall snapshot.
#[derive(Debug, Error)]
pub enum PeekError {
    /// Nothing is buffered for this mount namespace.
    #[error("no syscall history for mount namespace {0}")]
    Unknown(MountNsId),
    /// The history source could not be read.
    #[error("syscall history unavailable: {0}")]
    Unavailable(String),
}

/// Point-in-time syscall history per mount namespace.
///
/// Implemented by the syscall tracer collaborator. The agent calls
/// [`peek`](Self::peek) once per removed container and does not poll.
pub trait SyscallSnapshotSource: Send + Sync {
    /// Returns the syscall names recorded for `mntns`, in order.
    ///
    /// # Errors
    ///
    /// Returns a `PeekError` if no history can be produced.
    fn peek(&self, mntns: MountNsId) -> Result<Vec<String>, PeekError>;

    /// Tells the source that `mntns` is gone and its history can be freed.
    fn release(&self, _mntns: MountNsId) {}
}

/// In-memory syscall history fed from recorded data.
#[derive(Debug, Default)]
pub struct RecordedSnapshots {
    history: Mutex<HashMap<MountNsId, Vec<String>>>,
}

impl RecordedSnapshots {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends syscall names to the history of `mntns`.
    pub fn record<I, S>(&self, mntns: MountNsId, syscalls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.history
            .lock()
            .entry(mntns)
            .or_default()
            .extend(syscalls.into_iter().map(Into::into));
    }

    /// Number of mount namespaces with recorded history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}

impl SyscallSnapshotSource for RecordedSnapshots {
    fn peek(&self, mntns: MountNsId) -> Result<Vec<String>, PeekError> {
        self.history
            .lock()
            .get(&mntns)
            .cloned()
            .ok_or(PeekError::Unknown(mntns))
    }

    fn release(&self, mntns: MountNsId) {
        if self.history.lock().remove(&mntns).is_some() {
            tracing::debug!(%mntns, "released syscall history");
        }
    }
}
