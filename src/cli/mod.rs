//! Command-line interface for asking questions about local documents.

pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand};

use crate::models::{Config, OutputFormat};

/// Chat with your documents using a local Ollama model.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the model backends, applied on top of the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct BackendArgs {
    #[arg(
        long,
        global = true,
        env = "DOCQA_OLLAMA_URL",
        help = "Ollama server URL for embeddings and generation"
    )]
    pub ollama_url: Option<String>,

    #[arg(
        long,
        short = 'm',
        global = true,
        env = "DOCQA_MODEL",
        help = "Model used to generate answers"
    )]
    pub model: Option<String>,

    #[arg(
        long,
        global = true,
        env = "DOCQA_EMBED_MODEL",
        help = "Model used for embeddings (defaults to --model)"
    )]
    pub embed_model: Option<String>,
}

impl BackendArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.ollama_url {
            config.embedding.url = url.clone();
            config.generation.url = url.clone();
        }
        if let Some(ref model) = self.model {
            config.generation.model = model.clone();
            if self.embed_model.is_none() {
                config.embedding.model = model.clone();
            }
        }
        if let Some(ref model) = self.embed_model {
            config.embedding.model = model.clone();
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Answer a single question about one or more documents
    Ask(commands::AskArgs),

    /// Start an interactive conversation
    Chat(commands::ChatArgs),

    /// Show the chunks that would be used as context, without generating
    Search(commands::SearchArgs),

    /// Show how a document is split into chunks
    Chunk(commands::ChunkArgs),

    /// Check the Ollama server and show usage metrics
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
