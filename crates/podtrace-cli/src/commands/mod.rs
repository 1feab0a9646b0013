//! CLI command definitions and dispatch.

pub mod logs;
pub mod run;

use clap::{Parser, Subcommand, ValueEnum};

/// podtrace — per-container kernel activity logs.
#[derive(Parser, Debug)]
#[command(name = "podtrace", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Format of the agent's own log output.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Output format of the agent's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent until the feed ends or a shutdown signal arrives.
    Run(run::RunArgs),
    /// Print the activity log of one container.
    Logs(logs::LogsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Logs(args) => logs::execute(&args),
    }
}
