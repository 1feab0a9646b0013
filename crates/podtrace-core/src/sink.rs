//! Container-keyed table of open log sinks.
//!
//! The table is the only point where the lifecycle feed and the event
//! producers meet. Locking follows one order: the map lock (if taken)
//! before an entry lock, never the reverse.
//!
//! - The map is behind a `RwLock`. `lookup` clones an `Arc<SinkEntry>`
//!   under the read lock; `register` and `finalize` take the write lock
//!   but never hold it across a write or flush.
//! - Each entry keeps its state and writer behind one `Mutex`. Every
//!   append re-checks the state under that mutex, and `finalize` closes
//!   the writer under it, so a producer holding a stale `Arc` sees
//!   `Closed` and drops its line instead of writing to a released handle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use podtrace_common::error::{Result, TraceError};
use podtrace_common::types::{ContainerKey, MountNsId, SinkState};

/// Append-only line writer backing one container's log.
pub struct LogSink {
    path: PathBuf,
    writer: Box<dyn Write + Send>,
}

impl LogSink {
    /// Creates (or truncates) the file at `path` and opens it for append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or opened.
    pub fn create(path: &Path) -> Result<Self> {
        let io_err = |e| TraceError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        drop(File::create(path).map_err(io_err)?);
        let file = OpenOptions::new().append(true).open(path).map_err(io_err)?;
        Ok(Self::from_writer(path, file))
    }

    /// Wraps an arbitrary writer. `path` is only used in diagnostics.
    pub fn from_writer(path: impl Into<PathBuf>, writer: impl Write + Send + 'static) -> Self {
        Self {
            path: path.into(),
            writer: Box::new(writer),
        }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // One write_all per line: the caller holds the entry lock, and the
    // file is in append mode, so lines never interleave.
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.writer.write_all(buf.as_bytes())
    }

    fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Result of an append that did not fail with an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// The line was written.
    Written,
    /// The sink's state refused the write; the line was dropped.
    Refused(SinkState),
}

#[derive(Debug)]
struct EntryInner {
    state: SinkState,
    sink: Option<LogSink>,
}

/// A registered container's sink and lifecycle state.
#[derive(Debug)]
pub struct SinkEntry {
    key: ContainerKey,
    mntns: MountNsId,
    path: PathBuf,
    inner: Mutex<EntryInner>,
}

impl SinkEntry {
    fn new(key: ContainerKey, sink: LogSink, mntns: MountNsId) -> Self {
        Self {
            key,
            mntns,
            path: sink.path().to_path_buf(),
            inner: Mutex::new(EntryInner {
                state: SinkState::Active,
                sink: Some(sink),
            }),
        }
    }

    /// Container this sink belongs to.
    #[must_use]
    pub const fn key(&self) -> &ContainerKey {
        &self.key
    }

    /// Mount namespace recorded at registration.
    #[must_use]
    pub const fn mntns(&self) -> MountNsId {
        self.mntns
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SinkState {
        self.inner.lock().state
    }

    /// Appends a routed event line. Only `Active` sinks accept it.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Io` if the write fails.
    pub fn append(&self, line: &str) -> Result<Append> {
        self.write_if(line, |state| state == SinkState::Active)
    }

    /// Appends a line on behalf of the drain routine. `Active` and
    /// `Draining` sinks accept it.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Io` if the write fails.
    pub fn append_drained(&self, line: &str) -> Result<Append> {
        self.write_if(line, |state| state != SinkState::Closed)
    }

    fn write_if(&self, line: &str, accepts: impl FnOnce(SinkState) -> bool) -> Result<Append> {
        let mut inner = self.inner.lock();
        if !accepts(inner.state) {
            return Ok(Append::Refused(inner.state));
        }
        let Some(sink) = inner.sink.as_mut() else {
            return Ok(Append::Refused(SinkState::Closed));
        };
        sink.write_line(line).map_err(|e| TraceError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Append::Written)
    }

    fn begin_drain(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != SinkState::Active {
            return Err(TraceError::InvalidState {
                key: self.key.clone(),
                state: inner.state,
            });
        }
        inner.state = SinkState::Draining;
        Ok(())
    }

    /// Releases the writer. Returns `false` if it was already released.
    fn close(&self) -> Result<bool> {
        let mut inner = self.inner.lock();
        inner.state = SinkState::Closed;
        let Some(sink) = inner.sink.take() else {
            return Ok(false);
        };
        sink.close().map_err(|e| TraceError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(true)
    }
}

/// Process-wide mapping from container to open sink.
///
/// Holds at most one entry per key. Entries are added and removed by the
/// lifecycle handler only; any number of producers may look them up
/// concurrently.
#[derive(Debug, Default)]
pub struct SinkTable {
    entries: RwLock<HashMap<ContainerKey, Arc<SinkEntry>>>,
}

impl SinkTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an `Active` sink for `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if a key component is empty,
    /// `AlreadyRegistered` if `key` already has a sink, or `PathInUse` if
    /// another container's sink writes to the same file. The passed sink
    /// is dropped in every case.
    pub fn register(
        &self,
        key: ContainerKey,
        sink: LogSink,
        mntns: MountNsId,
    ) -> Result<Arc<SinkEntry>> {
        if !key.is_complete() {
            return Err(TraceError::InvalidKey { key });
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(TraceError::AlreadyRegistered { key });
        }
        if let Some(owner) = entries.values().find(|e| e.path() == sink.path()) {
            return Err(TraceError::PathInUse {
                path: sink.path().to_path_buf(),
                owner: owner.key().clone(),
            });
        }
        let entry = Arc::new(SinkEntry::new(key.clone(), sink, mntns));
        let _ = entries.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Returns the entry for `key`, if registered.
    ///
    /// A miss is the normal state for containers not yet added, already
    /// removed, or never selected.
    #[must_use]
    pub fn lookup(&self, key: &ContainerKey) -> Option<Arc<SinkEntry>> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the container whose sink writes to `path`, if any.
    #[must_use]
    pub fn path_owner(&self, path: &Path) -> Option<ContainerKey> {
        self.entries
            .read()
            .values()
            .find(|e| e.path() == path)
            .map(|e| e.key().clone())
    }

    /// Moves the sink for `key` from `Active` to `Draining`.
    ///
    /// Once this returns, [`SinkEntry::append`] refuses every line for the
    /// key; only [`SinkEntry::append_drained`] still writes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `key` has no sink, or `InvalidState` if the
    /// sink is already draining.
    pub fn begin_drain(&self, key: &ContainerKey) -> Result<Arc<SinkEntry>> {
        let entry = self
            .lookup(key)
            .ok_or_else(|| TraceError::sink_not_found(key))?;
        entry.begin_drain()?;
        Ok(entry)
    }

    /// Closes the sink for `key` and removes it from the table.
    ///
    /// The entry is removed even if flushing the writer fails. The flush
    /// happens after the map lock is released, so a producer stuck in a
    /// slow write on this entry does not stall other lookups.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `key` has no sink (including a second call for
    /// the same key), or `Io` if the final flush fails.
    pub fn finalize(&self, key: &ContainerKey) -> Result<()> {
        let entry = self
            .entries
            .write()
            .remove(key)
            .ok_or_else(|| TraceError::sink_not_found(key))?;
        let _ = entry.close()?;
        Ok(())
    }

    /// Closes and removes every remaining sink. Returns how many writers
    /// were released.
    ///
    /// Used at shutdown, when some remove notifications never arrive.
    pub fn finalize_all(&self) -> usize {
        let drained: Vec<_> = self.entries.write().drain().collect();
        let mut closed = 0;
        for (key, entry) in drained {
            match entry.close() {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    closed += 1;
                    tracing::warn!(container = %key, error = %e, "failed to flush log sink");
                }
            }
        }
        closed
    }

    /// State of the sink for `key`, if registered.
    #[must_use]
    pub fn state(&self, key: &ContainerKey) -> Option<SinkState> {
        self.lookup(key).map(|e| e.state())
    }

    /// Keys with a registered sink, in unspecified order.
    #[must_use]
    pub fn keys(&self) -> Vec<ContainerKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of registered (open) sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
