use anyhow::Result;
use clap::Parser;
use tokio::signal;

use docqa::cli::commands::{
    handle_ask, handle_chat, handle_chunk, handle_config, handle_search, handle_status,
};
use docqa::cli::{BackendArgs, Cli, Commands};
use docqa::models::{Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    docqa::logging::init(cli.verbose);

    let configured = Config::load().unwrap_or_default();
    let format = cli.format.unwrap_or(configured.output.default_format);
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, &cli.backend, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, exiting...");
        }
    }

    Ok(())
}

async fn run_command(
    command: Commands,
    backend: &BackendArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Ask(args) => handle_ask(args, backend, format, verbose).await,
        Commands::Chat(args) => handle_chat(args, backend, format, verbose).await,
        Commands::Search(args) => handle_search(args, backend, format, verbose).await,
        Commands::Chunk(args) => handle_chunk(args, backend, format, verbose).await,
        Commands::Status => handle_status(backend, format, verbose).await,
        Commands::Config(cmd) => handle_config(cmd, backend, format, verbose).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
