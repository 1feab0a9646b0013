//! Creates and retires container sinks in step with lifecycle notifications.
//!
//! Notifications for one container arrive in order (add before remove);
//! notifications for different containers may be handled concurrently,
//! so the handler is `Sync`. Adds are serialized among themselves so the
//! log-file collision check and file creation happen as one step.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use podtrace_common::error::TraceError;
use podtrace_common::selector::ContainerSelector;
use podtrace_common::types::{ContainerKey, MountNsId};
use podtrace_events::container::{ContainerInfo, ContainerNotification, NotificationKind};
use podtrace_events::snapshot::SyscallSnapshotSource;

use crate::format;
use crate::logs;
use crate::sink::{Append, LogSink, SinkEntry, SinkTable};

/// What a notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// A sink was opened at `path` and registered.
    Registered {
        /// Path of the new log file.
        path: PathBuf,
    },
    /// The container is not selected for tracing, or runs on another node.
    Skipped,
    /// The sink could not be created or registered.
    Rejected,
    /// The sink was drained and closed.
    Finalized {
        /// Snapshot lines written before closing.
        drained: usize,
    },
    /// Remove for a container without a sink.
    NotFound,
}

/// Consumes container add/remove notifications.
pub struct LifecycleHandler {
    table: Arc<SinkTable>,
    log_dir: PathBuf,
    selector: ContainerSelector,
    node_name: Option<String>,
    snapshots: Option<Arc<dyn SyscallSnapshotSource>>,
    adding: Mutex<()>,
}

impl LifecycleHandler {
    /// Creates a handler writing logs under `log_dir`, selecting every
    /// container and draining no syscall history.
    #[must_use]
    pub fn new(table: Arc<SinkTable>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            table,
            log_dir: log_dir.into(),
            selector: ContainerSelector::all(),
            node_name: None,
            snapshots: None,
            adding: Mutex::new(()),
        }
    }

    /// Only containers matching `selector` get a sink.
    #[must_use]
    pub fn with_selector(mut self, selector: ContainerSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Ignores adds for containers reported on a different node.
    #[must_use]
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    /// Drains syscall history from `source` when a container is removed.
    #[must_use]
    pub fn with_snapshots(mut self, source: Arc<dyn SyscallSnapshotSource>) -> Self {
        self.snapshots = Some(source);
        self
    }

    /// Handles one notification. Never fails; problems are logged.
    pub fn handle(&self, notification: &ContainerNotification) -> LifecycleOutcome {
        match notification.kind {
            NotificationKind::Added => self.on_added(&notification.container),
            NotificationKind::Removed => self.on_removed(&notification.container),
        }
    }

    /// Opens and registers a sink for a new container.
    pub fn on_added(&self, info: &ContainerInfo) -> LifecycleOutcome {
        let key = info.key();
        tracing::info!(
            container = %key,
            id = %info.id,
            pid = info.pid,
            mntns = %info.mntns,
            "container added"
        );

        if !key.is_complete() {
            tracing::warn!(key = ?key, "container identity incomplete, not traced");
            return LifecycleOutcome::Rejected;
        }
        if !self.is_local(info) {
            tracing::debug!(container = %key, node = ?info.node, "container on another node");
            return LifecycleOutcome::Skipped;
        }
        if !self.selector.matches(&info.labels) {
            tracing::debug!(container = %key, "container not selected for tracing");
            return LifecycleOutcome::Skipped;
        }
        let _adding = self.adding.lock();
        // Checked before creating the file so a duplicate add cannot
        // truncate a live log.
        if self.table.lookup(&key).is_some() {
            tracing::warn!(container = %key, "container already registered");
            return LifecycleOutcome::Rejected;
        }
        let path = logs::log_path(&self.log_dir, &key);
        if let Some(owner) = self.table.path_owner(&path) {
            tracing::warn!(
                container = %key,
                %owner,
                path = %path.display(),
                "log file already used by another container, not traced"
            );
            return LifecycleOutcome::Rejected;
        }

        let sink = match LogSink::create(&path) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!(container = %key, error = %e, "failed to create log sink");
                return LifecycleOutcome::Rejected;
            }
        };

        match self.table.register(key, sink, info.mntns) {
            Ok(entry) => {
                tracing::debug!(path = %entry.path().display(), "log sink registered");
                LifecycleOutcome::Registered { path }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register log sink");
                LifecycleOutcome::Rejected
            }
        }
    }

    /// Drains buffered syscall history into the container's sink, then
    /// closes it.
    pub fn on_removed(&self, info: &ContainerInfo) -> LifecycleOutcome {
        let key = info.key();
        tracing::info!(container = %key, id = %info.id, pid = info.pid, "container removed");

        let entry = match self.table.begin_drain(&key) {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                tracing::warn!(container = %key, id = %info.id, "container not found");
                // History is buffered for untraced containers too.
                self.release(info.mntns);
                return LifecycleOutcome::NotFound;
            }
            // Another remove is draining this sink and will release.
            Err(e) => {
                tracing::warn!(container = %key, error = %e, "cannot drain sink");
                return LifecycleOutcome::Rejected;
            }
        };

        let drained = self.drain_history(&entry);
        self.finalize(&key, entry.mntns());
        LifecycleOutcome::Finalized { drained }
    }

    fn drain_history(&self, entry: &SinkEntry) -> usize {
        let Some(source) = self.snapshots.as_ref() else {
            return 0;
        };
        let syscalls = match source.peek(entry.mntns()) {
            Ok(syscalls) => syscalls,
            Err(e) => {
                tracing::warn!(container = %entry.key(), error = %e, "failed to peek syscalls");
                return 0;
            }
        };

        let mut written = 0;
        for name in &syscalls {
            match entry.append_drained(&format::syscall_line(name)) {
                Ok(Append::Written) => written += 1,
                Ok(Append::Refused(state)) => {
                    tracing::warn!(container = %entry.key(), %state, "sink closed during drain");
                    break;
                }
                Err(e) => {
                    tracing::warn!(container = %entry.key(), error = %e, "failed to write syscall");
                }
            }
        }
        tracing::debug!(
            container = %entry.key(),
            written,
            total = syscalls.len(),
            "syscall history drained"
        );
        written
    }

    fn finalize(&self, key: &ContainerKey, mntns: MountNsId) {
        match self.table.finalize(key) {
            Ok(()) => {}
            Err(e @ TraceError::Io { .. }) => {
                tracing::warn!(container = %key, error = %e, "log sink closed with error");
            }
            Err(e) => tracing::warn!(container = %key, error = %e, "failed to finalize sink"),
        }
        self.release(mntns);
    }

    fn release(&self, mntns: MountNsId) {
        if let Some(source) = self.snapshots.as_ref() {
            source.release(mntns);
        }
    }

    fn is_local(&self, info: &ContainerInfo) -> bool {
        match (self.node_name.as_deref(), info.node.as_deref()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

impl std::fmt::Debug for LifecycleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHandler")
            .field("log_dir", &self.log_dir)
            .field("selector", &self.selector)
            .field("node_name", &self.node_name)
            .field("snapshots", &self.snapshots.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use podtrace_common::types::SinkState;
    use podtrace_events::snapshot::{PeekError, RecordedSnapshots};
    use tracing_test::traced_test;

    use super::*;

    struct FailingSource;

    impl SyscallSnapshotSource for FailingSource {
        fn peek(&self, _mntns: MountNsId) -> Result<Vec<String>, PeekError> {
            Err(PeekError::Unavailable("tracer detached".into()))
        }
    }

    fn info() -> ContainerInfo {
        ContainerInfo::new("a", "b", "c", MountNsId::new(4_026_532_100))
    }

    fn handler(dir: &Path) -> (Arc<SinkTable>, LifecycleHandler) {
        let table = Arc::new(SinkTable::new());
        let handler = LifecycleHandler::new(Arc::clone(&table), dir);
        (table, handler)
    }

    #[test]
    fn add_registers_sink_at_derived_path() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());

        let outcome = handler.handle(&ContainerNotification::added(info()));
        let expected = dir.path().join("a-b-c.log");
        assert_eq!(outcome, LifecycleOutcome::Registered { path: expected.clone() });
        assert!(expected.exists());
        assert_eq!(table.state(&info().key()), Some(SinkState::Active));
    }

    #[test]
    fn duplicate_add_keeps_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let _ = handler.on_added(&info());
        let entry = table.lookup(&info().key()).unwrap();
        let _ = entry.append("exec: sh").unwrap();

        assert_eq!(handler.on_added(&info()), LifecycleOutcome::Rejected);
        assert_eq!(std::fs::read_to_string(entry.path()).unwrap(), "exec: sh\n");
    }

    #[test]
    fn unselected_container_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let handler = handler.with_selector(ContainerSelector::with_labels(
            [("ig-trace".to_owned(), "file-access".to_owned())].into(),
        ));

        assert_eq!(handler.on_added(&info()), LifecycleOutcome::Skipped);
        assert!(table.is_empty());

        let labelled = info().label("ig-trace", "file-access");
        assert!(matches!(
            handler.on_added(&labelled),
            LifecycleOutcome::Registered { .. }
        ));
    }

    #[test]
    fn container_on_other_node_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let handler = handler.with_node_name("worker-1");

        let mut remote = info();
        remote.node = Some("worker-2".into());
        assert_eq!(handler.on_added(&remote), LifecycleOutcome::Skipped);

        let mut local = info();
        local.node = Some("worker-1".into());
        assert!(matches!(handler.on_added(&local), LifecycleOutcome::Registered { .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn incomplete_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let info = ContainerInfo::new("a", "", "c", MountNsId::new(1));
        assert_eq!(handler.on_added(&info), LifecycleOutcome::Rejected);
        assert!(table.is_empty());
    }

    #[test]
    #[traced_test]
    fn sink_creation_failure_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(&dir.path().join("does-not-exist"));

        assert_eq!(handler.on_added(&info()), LifecycleOutcome::Rejected);
        assert!(table.is_empty());
        assert!(logs_contain("failed to create log sink"));
    }

    #[test]
    fn remove_drains_snapshot_in_order_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(RecordedSnapshots::new());
        snapshots.record(info().mntns, ["read", "write", "exit_group"]);
        let (table, handler) = handler(dir.path());
        let source: Arc<dyn SyscallSnapshotSource> = Arc::clone(&snapshots) as _;
        let handler = handler.with_snapshots(source);

        let _ = handler.on_added(&info());
        let outcome = handler.handle(&ContainerNotification::removed(info()));

        assert_eq!(outcome, LifecycleOutcome::Finalized { drained: 3 });
        assert!(table.is_empty());
        assert!(snapshots.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a-b-c.log")).unwrap(),
            "syscall: read\nsyscall: write\nsyscall: exit_group\n"
        );
    }

    #[test]
    #[traced_test]
    fn snapshot_failure_still_closes_sink() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let handler = handler.with_snapshots(Arc::new(FailingSource));

        let _ = handler.on_added(&info());
        assert_eq!(
            handler.on_removed(&info()),
            LifecycleOutcome::Finalized { drained: 0 }
        );
        assert!(table.is_empty());
        assert!(logs_contain("failed to peek syscalls"));
    }

    #[test]
    fn remove_without_snapshot_source_closes_sink() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let _ = handler.on_added(&info());
        assert_eq!(
            handler.on_removed(&info()),
            LifecycleOutcome::Finalized { drained: 0 }
        );
        assert!(table.is_empty());
    }

    #[test]
    #[traced_test]
    fn remove_unknown_container_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());

        assert_eq!(handler.on_removed(&info()), LifecycleOutcome::NotFound);
        let _ = handler.on_added(&info());
        let _ = handler.on_removed(&info());
        assert_eq!(handler.on_removed(&info()), LifecycleOutcome::NotFound);
        assert!(table.is_empty());
        assert!(logs_contain("container not found"));
    }

    #[test]
    fn remove_of_untraced_container_releases_history() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(RecordedSnapshots::new());
        let (table, handler) = handler(dir.path());
        let source: Arc<dyn SyscallSnapshotSource> = Arc::clone(&snapshots) as _;
        let handler = handler
            .with_selector(ContainerSelector::with_labels(
                [("ig-trace".to_owned(), "file-access".to_owned())].into(),
            ))
            .with_snapshots(source);

        for i in 0..100_u64 {
            let unselected = ContainerInfo::new("ns", format!("pod-{i}"), "app", MountNsId::new(i));
            snapshots.record(unselected.mntns, ["read", "exit_group"]);
            assert_eq!(handler.on_added(&unselected), LifecycleOutcome::Skipped);
            assert_eq!(handler.on_removed(&unselected), LifecycleOutcome::NotFound);
        }
        assert!(table.is_empty());
        assert!(snapshots.is_empty());
    }

    #[test]
    #[traced_test]
    fn colliding_log_file_does_not_clobber_live_log() {
        let dir = tempfile::tempdir().unwrap();
        let (table, handler) = handler(dir.path());
        let first = ContainerInfo::new("a-b", "c", "d", MountNsId::new(1));
        let second = ContainerInfo::new("a", "b-c", "d", MountNsId::new(2));

        let LifecycleOutcome::Registered { path } = handler.on_added(&first) else {
            panic!("first container not registered");
        };
        let entry = table.lookup(&first.key()).unwrap();
        let _ = entry.append("exec: first-line").unwrap();

        assert_eq!(handler.on_added(&second), LifecycleOutcome::Rejected);
        assert!(table.lookup(&second.key()).is_none());
        assert!(logs_contain("log file already used by another container"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "exec: first-line\n");

        let _ = handler.on_removed(&first);
        assert!(matches!(handler.on_added(&second), LifecycleOutcome::Registered { .. }));
    }
}
