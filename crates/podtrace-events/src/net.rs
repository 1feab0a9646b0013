//! TCP activity events.

use podtrace_common::types::ContainerKey;
use serde::{Deserialize, Serialize};

/// A traced TCP connect, accept, or close in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpEvent {
    /// Container owning the socket.
    #[serde(flatten)]
    pub key: ContainerKey,
    /// Operation name as reported by the tracer (`connect`, `accept`, `close`).
    pub operation: String,
    /// Source address.
    pub saddr: String,
    /// Destination address.
    pub daddr: String,
}
