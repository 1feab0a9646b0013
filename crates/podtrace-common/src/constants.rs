//! System-wide constants and default values.

/// Default directory for per-container log files.
pub const DEFAULT_LOG_DIR: &str = "/tmp";

/// Extension of per-container log files.
pub const LOG_EXTENSION: &str = "log";

/// Pod label key selecting containers for tracing.
pub const TRACE_LABEL_KEY: &str = "ig-trace";

/// Pod label value selecting containers for tracing.
pub const TRACE_LABEL_VALUE: &str = "file-access";

/// Environment variable holding the name of the node the agent runs on.
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "PODTRACE_LOG_DIR";

/// Routing misses between two `warn`-level miss summaries.
pub const DEFAULT_MISS_LOG_INTERVAL: u64 = 1000;

/// Capacity of each producer channel in the agent binary.
pub const FEED_CHANNEL_CAPACITY: usize = 4096;
