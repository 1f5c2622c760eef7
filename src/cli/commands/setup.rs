//! Helpers shared by the commands that run the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::cli::BackendArgs;
use crate::cli::output::Formatter;
use crate::error::PipelineError;
use crate::models::Config;
use crate::services::{
    AnswerOutcome, DocumentExtractor, IndexStore, MetricsStore, OllamaEmbedder, OllamaGenerator,
};
use crate::session::{Answer, IngestReport, Session, SessionOptions};
use crate::utils::file::{collect_files, read_file_bytes};

pub(crate) fn load_config(backend: &BackendArgs) -> Result<Config> {
    let mut config = Config::load().context("failed to load configuration")?;
    backend.apply(&mut config);
    Ok(config)
}

pub(crate) fn build_session(config: &Config) -> Result<Session> {
    let embedder = OllamaEmbedder::new(&config.embedding)
        .context("failed to create embedding client")?;
    let generator = OllamaGenerator::new(&config.generation)
        .context("failed to create generation client")?;

    let mut session = Session::new(
        SessionOptions::from_config(config),
        Arc::new(embedder),
        Arc::new(generator),
    )?
    .with_extractor(Arc::new(DocumentExtractor::new(
        config.ingestion.max_file_size,
    )));

    if let Some(path) = config.index_path() {
        session = session.with_store(IndexStore::new(path, &config.embedding.model));
    }
    Ok(session)
}

/// Expand files and directories into the list of files to upload.
pub(crate) fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let found =
            collect_files(path).with_context(|| format!("cannot read {}", path.display()))?;
        files.extend(found);
    }
    Ok(files)
}

/// Upload every file under `paths` into the session.
///
/// A file that fails is reported and skipped; the rest are still indexed.
pub(crate) async fn ingest_paths(
    session: &Session,
    paths: &[PathBuf],
    config: &Config,
    formatter: &dyn Formatter,
    verbose: bool,
) -> Result<Vec<IngestReport>> {
    let files = expand_paths(paths)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut reports = Vec::with_capacity(files.len());
    for file in &files {
        pb.set_message(display_name(file));
        match ingest_file(session, file, config.ingestion.max_file_size).await {
            Ok(report) => {
                if verbose {
                    pb.suspend(|| eprint!("{}", formatter.format_ingest(&report)));
                }
                reports.push(report);
            }
            Err(e) => {
                pb.suspend(|| eprint!("{}", formatter.format_error(&format!("{e:#}"))));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(reports)
}

pub(crate) async fn ingest_file(
    session: &Session,
    path: &Path,
    max_size: u64,
) -> Result<IngestReport> {
    let bytes = read_file_bytes(path, max_size)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report = session.ingest(&path.display().to_string(), &bytes).await?;
    Ok(report)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn open_metrics(config: &Config) -> Option<MetricsStore> {
    if !config.metrics.enabled {
        return None;
    }
    let path = Config::metrics_db_path()?;
    match MetricsStore::open(&path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "metrics disabled");
            None
        }
    }
}

pub(crate) fn record_answer(
    store: Option<&MetricsStore>,
    result: &Result<Answer, PipelineError>,
    elapsed_ms: u64,
) {
    let Some(store) = store else {
        return;
    };
    match result {
        Ok(answer) => store.record(
            answer.duration_ms,
            answer.retrieval.len(),
            AnswerOutcome::Answered,
        ),
        Err(PipelineError::GenerationTimeout(_)) => {
            store.record(elapsed_ms, 0, AnswerOutcome::TimedOut)
        }
        // rejected before reaching the pipeline
        Err(PipelineError::SessionBusy | PipelineError::InvalidConfig(_)) => {}
        Err(_) => store.record(elapsed_ms, 0, AnswerOutcome::Failed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievalResult;
    use std::time::Duration;

    #[test]
    fn test_expand_paths_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# b").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("paper.pdf"), b"%PDF-1.7").unwrap();

        let files = expand_paths(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() != "png"));
        assert!(files.iter().any(|f| f.extension().unwrap() == "pdf"));
    }

    #[test]
    fn test_expand_paths_missing() {
        assert!(expand_paths(&[PathBuf::from("/nonexistent/docqa")]).is_err());
    }

    #[test]
    fn test_record_answer_outcomes() {
        let store = MetricsStore::open_in_memory().unwrap();
        let ok = Ok(Answer {
            question: "q".to_string(),
            text: "a".to_string(),
            retrieval: RetrievalResult::empty(),
            duration_ms: 5,
        });
        record_answer(Some(&store), &ok, 5);
        record_answer(
            Some(&store),
            &Err(PipelineError::GenerationTimeout(Duration::from_secs(1))),
            1000,
        );
        record_answer(Some(&store), &Err(PipelineError::SessionBusy), 0);

        let summary = store.get_summary(30);
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.timeouts, 1);
    }
}
