//! `podtrace logs` — Print a container's activity log.

use std::path::PathBuf;

use clap::Args;
use podtrace_common::constants::{DEFAULT_LOG_DIR, LOG_DIR_ENV};
use podtrace_common::types::ContainerKey;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Kubernetes namespace.
    pub namespace: String,

    /// Pod name.
    pub pod: String,

    /// Container name.
    pub container: String,

    /// Directory holding the per-container logs.
    #[arg(long, env = LOG_DIR_ENV, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the log file exists but cannot be read.
pub fn execute(args: &LogsArgs) -> anyhow::Result<()> {
    let key = ContainerKey::new(&args.namespace, &args.pod, &args.container);
    let path = podtrace_core::logs::log_path(&args.log_dir, &key);
    let logs = podtrace_core::logs::read_log(&path).map_err(|e| anyhow::anyhow!("{e}"))?;

    if logs.is_empty() {
        println!("No activity logged for container: {key}");
    } else {
        print!("{logs}");
    }

    Ok(())
}
