//! Newline-delimited JSON feed of collaborator output.
//!
//! Each line is one object tagged by a `kind` field, e.g.
//!
//! ```text
//! {"kind":"container_added","namespace":"a","pod":"b","container":"c","mntns":4026532001}
//! {"kind":"exec","namespace":"a","pod":"b","container":"c","retval":0,"comm":"sh"}
//! {"kind":"syscall_history","mntns":4026532001,"syscalls":["read","write"]}
//! ```

use podtrace_common::error::Result;
use podtrace_common::types::MountNsId;
use serde::{Deserialize, Serialize};

use crate::KernelEvent;
use crate::container::{ContainerInfo, ContainerNotification};
use crate::{ExecEvent, OpenEvent, SyscallEvent, TcpEvent};

/// One record of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedRecord {
    /// A container was added.
    ContainerAdded(ContainerInfo),
    /// A container was removed.
    ContainerRemoved(ContainerInfo),
    /// Exec tracer output.
    Exec(ExecEvent),
    /// Open tracer output.
    Open(OpenEvent),
    /// TCP tracer output.
    Tcp(TcpEvent),
    /// Syscall tracer output.
    Syscall(SyscallEvent),
    /// Buffered syscall history for a mount namespace.
    SyscallHistory {
        /// Mount namespace the history belongs to.
        mntns: MountNsId,
        /// Syscall names, oldest first.
        syscalls: Vec<String>,
    },
    /// A record kind this agent does not know.
    #[serde(other)]
    Unknown,
}

/// Where a record is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// To the lifecycle handler.
    Lifecycle(ContainerNotification),
    /// To the event router.
    Event(KernelEvent),
    /// To the syscall history source.
    History {
        /// Mount namespace the history belongs to.
        mntns: MountNsId,
        /// Syscall names, oldest first.
        syscalls: Vec<String>,
    },
    /// Nowhere.
    Ignore,
}

impl FeedRecord {
    /// Classifies the record by its consumer.
    #[must_use]
    pub fn into_dispatch(self) -> Dispatch {
        match self {
            Self::ContainerAdded(info) => Dispatch::Lifecycle(ContainerNotification::added(info)),
            Self::ContainerRemoved(info) => {
                Dispatch::Lifecycle(ContainerNotification::removed(info))
            }
            Self::Exec(e) => Dispatch::Event(e.into()),
            Self::Open(e) => Dispatch::Event(e.into()),
            Self::Tcp(e) => Dispatch::Event(e.into()),
            Self::Syscall(e) => Dispatch::Event(e.into()),
            Self::SyscallHistory { mntns, syscalls } => Dispatch::History { mntns, syscalls },
            Self::Unknown => Dispatch::Ignore,
        }
    }
}

/// Parses one feed line.
///
/// # Errors
///
/// Returns `TraceError::Serialization` if the line is not a valid record.
pub fn parse_record(line: &str) -> Result<FeedRecord> {
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use podtrace_common::types::ContainerKey;

    use super::*;
    use crate::container::NotificationKind;

    #[test]
    fn parses_container_added() {
        let record = parse_record(
            r#"{"kind":"container_added","namespace":"a","pod":"b","container":"c","mntns":4026532001,"labels":{"ig-trace":"file-access"}}"#,
        )
        .unwrap();
        let Dispatch::Lifecycle(notification) = record.into_dispatch() else {
            panic!("expected lifecycle dispatch");
        };
        assert_eq!(notification.kind, NotificationKind::Added);
        assert_eq!(notification.container.mntns, MountNsId::new(4_026_532_001));
        assert_eq!(notification.container.key(), ContainerKey::new("a", "b", "c"));
    }

    #[test]
    fn parses_exec_with_flattened_key() {
        let record = parse_record(
            r#"{"kind":"exec","namespace":"a","pod":"b","container":"c","retval":0,"comm":"sh","args":["/bin/sh","-c"]}"#,
        )
        .unwrap();
        let FeedRecord::Exec(event) = record else {
            panic!("expected exec record");
        };
        assert_eq!(event.key, ContainerKey::new("a", "b", "c"));
        assert_eq!(event.image_name(), "/bin/sh");
    }

    #[test]
    fn parses_tcp_and_open() {
        let tcp = parse_record(
            r#"{"kind":"tcp","namespace":"a","pod":"b","container":"c","operation":"connect","saddr":"10.0.0.2:4100","daddr":"10.0.0.9:443"}"#,
        )
        .unwrap();
        assert!(matches!(tcp.into_dispatch(), Dispatch::Event(KernelEvent::Tcp(_))));

        let open = parse_record(
            r#"{"kind":"open","namespace":"a","pod":"b","container":"c","ret":-2,"path":"/nope"}"#,
        )
        .unwrap();
        assert!(matches!(open.into_dispatch(), Dispatch::Event(KernelEvent::Open(e)) if !e.succeeded()));
    }

    #[test]
    fn parses_syscall_history() {
        let record =
            parse_record(r#"{"kind":"syscall_history","mntns":5,"syscalls":["read","write"]}"#)
                .unwrap();
        assert_eq!(
            record.into_dispatch(),
            Dispatch::History {
                mntns: MountNsId::new(5),
                syscalls: vec!["read".into(), "write".into()],
            }
        );
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let record = parse_record(r#"{"kind":"container_paused"}"#).unwrap();
        assert_eq!(record.into_dispatch(), Dispatch::Ignore);
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_record("not json").is_err());
        assert!(parse_record(r#"{"kind":"exec","namespace":"a"}"#).is_err());
    }
}
