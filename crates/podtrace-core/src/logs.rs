//! Per-container log file locations.

use std::path::{Path, PathBuf};

use podtrace_common::constants::LOG_EXTENSION;
use podtrace_common::error::{Result, TraceError};
use podtrace_common::types::ContainerKey;

/// Returns the log file path for a container:
/// `{log_dir}/{namespace}-{pod}-{container}.log`.
///
/// Path separators inside a component are replaced with `_` so the file
/// always lands directly in `log_dir`.
#[must_use]
pub fn log_path(log_dir: &Path, key: &ContainerKey) -> PathBuf {
    log_dir.join(format!(
        "{}-{}-{}.{LOG_EXTENSION}",
        path_safe(key.namespace()),
        path_safe(key.pod()),
        path_safe(key.container()),
    ))
}

fn path_safe(component: &str) -> String {
    component.replace(['/', '\\'], "_")
}

/// Reads a container log from disk.
///
/// Returns an empty string if the log file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_log(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(path).map_err(|e| TraceError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let key = ContainerKey::new("default", "web-0", "nginx");
        let p = log_path(Path::new("/tmp"), &key);
        assert_eq!(p.to_str().unwrap(), "/tmp/default-web-0-nginx.log");
    }

    #[test]
    fn log_path_cannot_escape_log_dir() {
        let key = ContainerKey::new("ns", "../../etc", "c");
        let p = log_path(Path::new("/tmp"), &key);
        assert_eq!(p.parent(), Some(Path::new("/tmp")));
        assert_eq!(p.file_name().unwrap(), "ns-.._.._etc-c.log");
    }

    #[test]
    fn read_log_missing_file_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_log(&dir.path().join("nonexistent.log")).expect("should succeed");
        assert!(content.is_empty());
    }

    #[test]
    fn separate_containers_have_separate_paths() {
        let dir = Path::new("/var/log/podtrace");
        let a = log_path(dir, &ContainerKey::new("ns", "pod", "a"));
        let b = log_path(dir, &ContainerKey::new("ns", "pod", "b"));
        assert_ne!(a, b);
    }
}
