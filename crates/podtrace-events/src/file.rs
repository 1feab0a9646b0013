//! File open events.

use podtrace_common::types::ContainerKey;
use serde::{Deserialize, Serialize};

/// A traced `open`/`openat` in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEvent {
    /// Container that opened the file.
    #[serde(flatten)]
    pub key: ContainerKey,
    /// Returned file descriptor, or a negative errno.
    pub ret: i64,
    /// Path that was opened.
    pub path: String,
}

impl OpenEvent {
    /// Returns `true` if the open produced a descriptor.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.ret >= 0
    }
}
