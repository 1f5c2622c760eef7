use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::setup::load_config;
use crate::cli::BackendArgs;
use crate::cli::output::get_formatter;
use crate::models::{Document, OutputFormat};
use crate::services::{PlainTextExtractor, TextChunker, TextExtractor};
use crate::utils::file::read_file_bytes;

#[derive(Debug, Args)]
pub struct ChunkArgs {
    #[arg(required = true, help = "Document to split")]
    pub path: PathBuf,

    #[arg(long, short = 's', help = "Chunk size in characters")]
    pub chunk_size: Option<usize>,

    #[arg(long, short = 'o', help = "Overlap between chunks in characters")]
    pub overlap: Option<usize>,
}

pub async fn handle_chunk(
    args: ChunkArgs,
    backend: &BackendArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = load_config(backend)?;
    let formatter = get_formatter(format);

    let chunk_size = args.chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = args.overlap.unwrap_or(config.chunking.chunk_overlap);
    let chunker = TextChunker::new(chunk_size, overlap)?;

    let name = args.path.display().to_string();
    let bytes = read_file_bytes(&args.path, config.ingestion.max_file_size)
        .with_context(|| format!("failed to read {name}"))?;
    let text = PlainTextExtractor::new(config.ingestion.max_file_size).extract(&name, &bytes)?;

    let document = Document::new(name.clone(), text);
    if verbose {
        eprintln!(
            "{} chars, chunk size {}, overlap {}",
            document.char_len(),
            chunker.chunk_size(),
            chunker.overlap()
        );
    }

    let chunks = chunker.split(&document);
    print!("{}", formatter.format_chunks(&name, &chunks));

    Ok(())
}
