use anyhow::Result;
use clap::Parser;
use nerdvm::cli::Commands;
use nerdvm::{cli, commands, Config};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize logging
    // Logs go to stderr: stdout carries the runtime's output, which callers
    // pipe into JSON tools.
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let use_color = atty::is(atty::Stream::Stderr);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(use_color)
        .init();

    let mut config = Config::from_env();
    if let Some(instance) = cli.instance {
        config = config.instance_name(instance);
    }

    // Dispatch to appropriate command handler
    let result = match cli.cmd {
        Commands::Runtime(argv) => commands::cmd_runtime(config, argv).await,
    };

    // Handle errors
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
