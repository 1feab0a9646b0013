//! Process execution events.

use podtrace_common::types::ContainerKey;
use serde::{Deserialize, Serialize};

/// A traced `execve` in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEvent {
    /// Container that executed the process.
    #[serde(flatten)]
    pub key: ContainerKey,
    /// Return value of the exec; negative on failure.
    pub retval: i64,
    /// Kernel command name of the task.
    pub comm: String,
    /// Argument vector, when captured.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExecEvent {
    /// Returns `true` if the exec succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.retval >= 0
    }

    /// Name of the executed image: `args[0]` when present, else `comm`.
    #[must_use]
    pub fn image_name(&self) -> &str {
        self.args.first().map_or(self.comm.as_str(), String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(retval: i64, args: &[&str]) -> ExecEvent {
        ExecEvent {
            key: ContainerKey::new("a", "b", "c"),
            retval,
            comm: "sh".into(),
            args: args.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn image_name_prefers_first_argument() {
        assert_eq!(event(0, &["/usr/bin/curl", "-s"]).image_name(), "/usr/bin/curl");
    }

    #[test]
    fn image_name_falls_back_to_comm() {
        assert_eq!(event(0, &[]).image_name(), "sh");
    }

    #[test]
    fn negative_retval_is_failure() {
        assert!(event(0, &[]).succeeded());
        assert!(!event(-2, &[]).succeeded());
    }
}
