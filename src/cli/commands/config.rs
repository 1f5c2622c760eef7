use anyhow::{Context, Result};
use clap::Subcommand;

use super::setup::load_config;
use crate::cli::BackendArgs;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a configuration file with default values")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration, index and metrics file paths")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    backend: &BackendArgs,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(backend, format),
        ConfigCommand::Path => handle_path(backend, format),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to write config")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(backend: &BackendArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(backend)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Markdown => {
            println!("```toml");
            print!("{}", toml::to_string_pretty(&config)?);
            println!("```");
        }
        OutputFormat::Text => {
            if let Some(path) = Config::config_path().filter(|p| p.exists()) {
                println!("# Config: {}", path.display());
            } else {
                println!("# Config: defaults (no config file)");
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn handle_path(backend: &BackendArgs, format: OutputFormat) -> Result<()> {
    let index = load_config(backend)?
        .index_path()
        .map(|p| p.display().to_string());
    let config = Config::config_path().map(|p| p.display().to_string());
    let metrics = Config::metrics_db_path().map(|p| p.display().to_string());

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "config": config,
            "index": index,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let unknown = || "(unknown)".to_string();
    println!("Config:  {}", config.unwrap_or_else(unknown));
    println!(
        "Index:   {}",
        index.unwrap_or_else(|| "(not stored)".to_string())
    );
    println!("Metrics: {}", metrics.unwrap_or_else(unknown));
    Ok(())
}
