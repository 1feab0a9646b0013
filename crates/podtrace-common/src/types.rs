//! Domain primitive types used across the podtrace workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one traced container: `(namespace, pod, container)`.
///
/// Equality is structural. A registered key never has an empty component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerKey {
    namespace: String,
    pod: String,
    container: String,
}

impl ContainerKey {
    /// Creates a key from its three components.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }

    /// Kubernetes namespace of the pod.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Pod name.
    #[must_use]
    pub fn pod(&self) -> &str {
        &self.pod
    }

    /// Container name within the pod.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns `true` when no component is empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.namespace.is_empty() && !self.pod.is_empty() && !self.container.is_empty()
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}

/// Mount namespace inode number of a container.
///
/// Used by the syscall history collaborator to locate the kernel-side
/// buffer belonging to one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountNsId(u64);

impl MountNsId {
    /// Wraps a raw mount namespace inode number.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw inode number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MountNsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container's log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkState {
    /// Accepting routed events.
    Active,
    /// Container removed; only the drain routine may still write.
    Draining,
    /// Handle released. A closed sink is never reused.
    Closed,
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Draining => write!(f, "draining"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
