//! Unified error types for the podtrace workspace.
//!
//! None of these are fatal to the agent. Callers in the core log them and
//! degrade (drop the event, skip the container) instead of propagating.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ContainerKey, SinkState};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A sink is already registered for this container.
    #[error("sink already registered for container {key}")]
    AlreadyRegistered {
        /// Key of the existing registration.
        key: ContainerKey,
    },

    /// Another container's sink already writes to this log file.
    #[error("log file {path} already used by container {owner}")]
    PathInUse {
        /// Contested log file.
        path: PathBuf,
        /// Container owning the file.
        owner: ContainerKey,
    },

    /// The container key has an empty component.
    #[error("invalid container key {key:?}")]
    InvalidKey {
        /// Offending key.
        key: ContainerKey,
    },

    /// The sink is not in a state that permits the operation.
    #[error("sink for container {key} is {state}")]
    InvalidState {
        /// Key of the sink.
        key: ContainerKey,
        /// State the sink was found in.
        state: SinkState,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl TraceError {
    /// Builds the `NotFound` error used for unknown sink keys.
    #[must_use]
    pub fn sink_not_found(key: &ContainerKey) -> Self {
        Self::NotFound {
            kind: "sink",
            id: key.to_string(),
        }
    }

    /// Returns `true` for `NotFound` errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TraceError>;
