//! Agent configuration model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, TraceError};
use crate::selector::ContainerSelector;

/// Root configuration for the podtrace agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory receiving one log file per traced container.
    pub log_dir: PathBuf,
    /// Name of the node this agent runs on.
    pub node_name: Option<String>,
    /// Trace every container, ignoring `selector_labels`.
    pub trace_all: bool,
    /// Pod labels a container must carry to be traced.
    pub selector_labels: BTreeMap<String, String>,
    /// Routing misses between two `warn`-level miss summaries.
    pub miss_log_interval: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
            node_name: None,
            trace_all: false,
            selector_labels: BTreeMap::from([(
                constants::TRACE_LABEL_KEY.to_owned(),
                constants::TRACE_LABEL_VALUE.to_owned(),
            )]),
            miss_log_interval: constants::DEFAULT_MISS_LOG_INTERVAL,
        }
    }
}

impl AgentConfig {
    /// Checks the configuration before the agent starts.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Config` if the log directory is empty, the miss
    /// interval is zero, or no node name is set.
    pub fn validate(&self) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(TraceError::Config {
                message: "log directory must not be empty".into(),
            });
        }
        if self.miss_log_interval == 0 {
            return Err(TraceError::Config {
                message: "miss log interval must be at least 1".into(),
            });
        }
        match self.node_name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(TraceError::Config {
                message: format!("{} environment variable not set", constants::NODE_NAME_ENV),
            }),
        }
    }

    /// Returns the selector deciding which containers get a sink.
    #[must_use]
    pub fn selector(&self) -> ContainerSelector {
        if self.trace_all {
            ContainerSelector::all()
        } else {
            ContainerSelector::with_labels(self.selector_labels.clone())
        }
    }
}
