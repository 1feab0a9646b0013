//! Formatted output helpers for CLI commands.

use podtrace_core::RouterStats;

/// Formats routing counters as a single summary line, e.g.
/// `written=10 filtered=2 missed=1 dropped=0 failed=0`.
#[must_use]
pub fn format_stats(stats: &RouterStats) -> String {
    format!(
        "written={} filtered={} missed={} dropped={} failed={}",
        stats.written, stats.filtered, stats.missed, stats.dropped, stats.failed
    )
}
