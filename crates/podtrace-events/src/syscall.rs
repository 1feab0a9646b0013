//! Syscall events.

use podtrace_common::types::ContainerKey;
use serde::{Deserialize, Serialize};

/// A single syscall observed in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallEvent {
    /// Container that made the syscall.
    #[serde(flatten)]
    pub key: ContainerKey,
    /// Syscall name.
    pub name: String,
}

impl SyscallEvent {
    /// Creates a syscall event.
    #[must_use]
    pub fn new(key: ContainerKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
        }
    }
}
