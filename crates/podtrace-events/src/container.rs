//! Container lifecycle notifications.
//!
//! Delivered by the container discovery collaborator. For a single
//! container the add always precedes the remove; notifications for
//! different containers carry no ordering.

use std::collections::BTreeMap;

use podtrace_common::types::{ContainerKey, MountNsId};
use serde::{Deserialize, Serialize};

/// A container as described by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Kubernetes namespace.
    pub namespace: String,
    /// Pod name.
    pub pod: String,
    /// Container name within the pod.
    pub container: String,
    /// Runtime container ID.
    #[serde(default)]
    pub id: String,
    /// PID of the container's init process.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Mount namespace of the container.
    #[serde(default)]
    pub mntns: MountNsId,
    /// Pod labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Node the container runs on, when enriched.
    #[serde(default)]
    pub node: Option<String>,
}

impl ContainerInfo {
    /// Creates a description with only identity and mount namespace set.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
        mntns: MountNsId,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
            id: String::new(),
            pid: None,
            mntns,
            labels: BTreeMap::new(),
            node: None,
        }
    }

    /// Adds a pod label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.labels.insert(key.into(), value.into());
        self
    }

    /// Routing key of this container.
    #[must_use]
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.namespace, &self.pod, &self.container)
    }
}

/// Kind of a lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Container started and became traceable.
    Added,
    /// Container went away.
    Removed,
}

/// A container lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerNotification {
    /// What happened.
    pub kind: NotificationKind,
    /// Container it happened to.
    pub container: ContainerInfo,
}

impl ContainerNotification {
    /// A container-added notification.
    #[must_use]
    pub const fn added(container: ContainerInfo) -> Self {
        Self {
            kind: NotificationKind::Added,
            container,
        }
    }

    /// A container-removed notification.
    #[must_use]
    pub const fn removed(container: ContainerInfo) -> Self {
        Self {
            kind: NotificationKind::Removed,
            container,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_derived_from_identity_fields() {
        let info = ContainerInfo::new("default", "api-5d", "server", MountNsId::new(7));
        assert_eq!(info.key(), ContainerKey::new("default", "api-5d", "server"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let info: ContainerInfo =
            serde_json::from_str(r#"{"namespace":"a","pod":"b","container":"c"}"#).unwrap();
        assert_eq!(info.mntns, MountNsId::default());
        assert!(info.labels.is_empty());
        assert!(info.node.is_none());
    }
}
