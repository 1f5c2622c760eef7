use anyhow::Result;

use super::setup::{load_config, open_metrics};
use crate::cli::BackendArgs;
use crate::cli::output::{BackendState, BackendStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{OllamaEmbedder, OllamaGenerator};

fn backend_state<E: std::fmt::Display>(result: Result<bool, E>) -> BackendState {
    match result {
        Ok(true) => BackendState::Ready,
        Ok(false) => BackendState::ModelMissing,
        Err(e) => BackendState::Unreachable(e.to_string()),
    }
}

pub async fn handle_status(
    backend: &BackendArgs,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let config = load_config(backend)?;
    let formatter = get_formatter(format);

    let embedding = match OllamaEmbedder::new(&config.embedding) {
        Ok(client) => backend_state(client.health_check().await),
        Err(e) => BackendState::Unreachable(e.to_string()),
    };
    let generation = match OllamaGenerator::new(&config.generation) {
        Ok(client) => backend_state(client.health_check().await),
        Err(e) => BackendState::Unreachable(e.to_string()),
    };

    let metrics = open_metrics(&config).map(|store| {
        store.cleanup(config.metrics.retention_days);
        store.get_summary(config.metrics.retention_days)
    });

    let status = StatusInfo {
        embedding: BackendStatus {
            url: config.embedding.url.clone(),
            model: config.embedding.model.clone(),
            state: embedding,
        },
        generation: BackendStatus {
            url: config.generation.url.clone(),
            model: config.generation.model.clone(),
            state: generation,
        },
        config_path: Config::config_path()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string()),
        metrics,
    };

    print!("{}", formatter.format_status(&status));

    let hint_for = |backend: &BackendStatus| match backend.state {
        BackendState::Ready => None,
        BackendState::ModelMissing => Some(format!(
            "Hint: model '{}' is not installed. Run: ollama pull {}",
            backend.model, backend.model
        )),
        BackendState::Unreachable(_) => Some(format!(
            "Warning: Ollama not reachable at {}. Start it with: ollama serve",
            backend.url
        )),
    };
    let mut hints: Vec<String> = [&status.embedding, &status.generation]
        .into_iter()
        .filter_map(hint_for)
        .collect();
    hints.dedup();
    if !hints.is_empty() {
        eprintln!();
        for hint in hints {
            eprintln!("{hint}");
        }
    }

    Ok(())
}
