use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use super::setup::{build_session, ingest_paths, load_config};
use crate::cli::BackendArgs;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Question to find context for")]
    pub query: String,

    #[arg(
        long = "doc",
        short = 'd',
        help = "Document file or directory to add before searching (repeatable)"
    )]
    pub documents: Vec<PathBuf>,

    #[arg(long, short = 'k', help = "Number of chunks to return")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Minimum similarity score threshold (-1.0 to 1.0)")]
    pub min_score: Option<f32>,
}

pub async fn handle_search(
    args: SearchArgs,
    backend: &BackendArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let mut config = load_config(backend)?;
    if let Some(score) = args.min_score {
        if !(-1.0..=1.0).contains(&score) {
            anyhow::bail!("min_score must be between -1.0 and 1.0");
        }
        config.retrieval.min_score = Some(score);
    }

    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }

    let formatter = get_formatter(format);
    let session = build_session(&config)?;

    let index_start = Instant::now();
    ingest_paths(
        &session,
        &args.documents,
        &config,
        formatter.as_ref(),
        verbose,
    )
    .await?;
    let index_ms = index_start.elapsed().as_millis();
    if session.stats().await.chunks == 0 {
        anyhow::bail!("no documents indexed yet; pass one with --doc");
    }

    let search_start = Instant::now();
    let results = session
        .retrieve(query, top_k)
        .await
        .context("search failed")?;
    let search_ms = search_start.elapsed().as_millis();

    if verbose {
        eprintln!("Timing:");
        eprintln!("  Indexing: {index_ms}ms");
        eprintln!("  Search: {search_ms}ms");
        eprintln!();
    }

    print!("{}", formatter.format_retrieval(query, &results));

    Ok(())
}
