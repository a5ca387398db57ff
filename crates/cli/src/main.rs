//! Pincer CLI entry point.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pincer", version, about = "A personal AI agent with tools, sessions, and scheduled prompts")]
struct Cli {
    /// Increase log verbosity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the agent (interactive, or single-shot with -m)
    Agent {
        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run the background services (heartbeat, cron) until Ctrl-C
    Daemon,

    /// Show configuration, provider, and tool status
    Status,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Agent { message } => commands::agent::run(message).await,
        Command::Daemon => commands::daemon::run().await,
        Command::Status => commands::status::run().await,
    }
}
