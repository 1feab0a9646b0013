//! `podtrace run` — Run the node agent.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use podtrace_common::config::AgentConfig;
use podtrace_common::constants::{
    DEFAULT_LOG_DIR, DEFAULT_MISS_LOG_INTERVAL, LOG_DIR_ENV, NODE_NAME_ENV, TRACE_LABEL_KEY,
    TRACE_LABEL_VALUE,
};
use tokio::io::{AsyncBufRead, BufReader};

use crate::agent::Agent;
use crate::output::format_stats;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Trace all containers instead of only labelled pods.
    #[arg(long)]
    pub all: bool,

    /// Directory receiving one log file per container.
    #[arg(long, env = LOG_DIR_ENV, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Name of the node this agent runs on.
    #[arg(long, env = NODE_NAME_ENV)]
    pub node_name: Option<String>,

    /// Pod label selecting containers, as KEY=VALUE. Repeatable.
    /// Defaults to ig-trace=file-access.
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// Newline-delimited JSON feed of tracer and container events;
    /// `-` reads standard input.
    #[arg(long, default_value = "-")]
    pub feed: String,

    /// Routing misses between two warning-level miss summaries.
    #[arg(long, default_value_t = DEFAULT_MISS_LOG_INTERVAL)]
    pub miss_log_interval: u64,
}

impl RunArgs {
    /// Builds the agent configuration from the parsed flags.
    fn to_config(&self) -> AgentConfig {
        let selector_labels: BTreeMap<_, _> = if self.labels.is_empty() {
            BTreeMap::from([(TRACE_LABEL_KEY.to_owned(), TRACE_LABEL_VALUE.to_owned())])
        } else {
            self.labels.iter().cloned().collect()
        };
        AgentConfig {
            log_dir: self.log_dir.clone(),
            node_name: self.node_name.clone(),
            trace_all: self.all,
            selector_labels,
            miss_log_interval: self.miss_log_interval,
        }
    }
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_owned(), v.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

/// Executes the `run` command.
///
/// Exits cleanly on SIGINT/SIGTERM or at the end of the feed, closing
/// every sink that is still open.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the feed cannot be
/// opened or read, or the async runtime cannot start.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("failed to initialize service: {e}"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let feed = open_feed(&args.feed).await?;
        let agent = Agent::new(&config);
        tracing::info!(
            node = config.node_name.as_deref().unwrap_or_default(),
            log_dir = %config.log_dir.display(),
            trace_all = config.trace_all,
            feed = %args.feed,
            "agent started"
        );

        let summary = agent.run(feed, shutdown_signal()).await?;
        tracing::info!(
            closed_sinks = summary.closed_sinks,
            records = summary.feed.records,
            malformed = summary.feed.malformed,
            ignored = summary.feed.ignored,
            routing = %format_stats(&summary.router),
            "shutting down"
        );
        Ok::<_, anyhow::Error>(())
    })
}

async fn open_feed(feed: &str) -> anyhow::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    if feed == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(feed)
        .await
        .with_context(|| format!("failed to open feed {feed}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        args
    }

    #[test]
    fn defaults_select_labelled_pods() {
        let args = run_args(&["podtrace", "run", "--node-name", "worker-1"]);
        let config = args.to_config();
        assert!(!config.trace_all);
        assert_eq!(config.selector_labels.len(), 1);
        assert_eq!(config.selector_labels["ig-trace"], "file-access");
        assert_eq!(args.feed, "-");
        config.validate().unwrap();
    }

    #[test]
    fn labels_replace_the_default_selector() {
        let args = run_args(&[
            "podtrace",
            "run",
            "--node-name",
            "n",
            "--label",
            "app=web",
            "--label",
            "tier=front",
        ]);
        let config = args.to_config();
        assert_eq!(config.selector_labels.len(), 2);
        assert_eq!(config.selector_labels["tier"], "front");
    }

    #[test]
    fn all_flag_traces_everything() {
        let config = run_args(&["podtrace", "run", "--all", "--node-name", "n"]).to_config();
        assert!(config.selector().labels().is_empty());
    }

    #[test]
    fn malformed_label_is_rejected() {
        assert!(Cli::try_parse_from(["podtrace", "run", "--label", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["podtrace", "run", "--label", "=x"]).is_err());
    }

    #[test]
    fn parse_label_allows_empty_value() {
        assert_eq!(parse_label("k="), Ok(("k".into(), String::new())));
    }
}
