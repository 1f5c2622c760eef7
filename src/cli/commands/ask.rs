use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use super::setup::{build_session, ingest_paths, load_config, open_metrics, record_answer};
use crate::cli::BackendArgs;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer")]
    pub question: String,

    #[arg(
        long = "doc",
        short = 'd',
        help = "Document file or directory to use as context (repeatable)"
    )]
    pub documents: Vec<PathBuf>,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve")]
    pub top_k: Option<usize>,

    #[arg(long, short = 'c', help = "Show the retrieved context")]
    pub show_context: bool,
}

pub async fn handle_ask(
    args: AskArgs,
    backend: &BackendArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let config = load_config(backend)?;
    let formatter = get_formatter(format);
    let session = build_session(&config)?;

    let reports = ingest_paths(
        &session,
        &args.documents,
        &config,
        formatter.as_ref(),
        verbose,
    )
    .await?;
    if !args.documents.is_empty() && reports.is_empty() {
        anyhow::bail!("none of the given documents could be indexed");
    }

    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);
    if verbose {
        eprintln!("Question: \"{question}\"");
        eprintln!("  Model: {}", config.generation.model);
        eprintln!("  Top-k: {top_k}");
    }

    let metrics = open_metrics(&config);
    let start = Instant::now();
    let result = session.ask_with(question, top_k).await;
    record_answer(
        metrics.as_ref(),
        &result,
        start.elapsed().as_millis() as u64,
    );

    let answer = match result {
        Ok(answer) => answer,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };
    if verbose {
        eprintln!("Answered in {}ms\n", answer.duration_ms);
    }
    print!("{}", formatter.format_answer(&answer, args.show_context));

    Ok(())
}
