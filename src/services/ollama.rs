use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Query `/api/tags` and report whether `model` is installed.
///
/// Ollama lists models with an explicit tag (`llama2:latest`), so a bare
/// name matches any tag of that model.
pub(crate) async fn has_model(client: &Client, base_url: &str, model: &str) -> Result<bool, String> {
    let url = format!("{}/api/tags", base_url);
    let response = client.get(&url).send().await.map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }

    let tags: TagsResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(tags.models.iter().any(|m| model_matches(&m.name, model)))
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    if wanted.contains(':') {
        installed == wanted
    } else {
        installed.split(':').next() == Some(wanted)
    }
}
