use crate::error::PipelineError;
use base64::Engine;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/images/generations";
const DEFAULT_MODEL: &str = "gpt-image-1";
const DEFAULT_SIZE: &str = "1792x1024";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Still-image generation collaborator. Given a prompt it writes one
/// image file; any failure is a GenerationError so the caller can fall
/// back to another seed provider.
pub struct ImageClient {
    pub client: reqwest::Client,
    pub base_url: String,
    pub model: String,
    pub size: String,
    pub api_key_env: String,
}

impl ImageClient {
    pub fn new(model: Option<&str>, api_key_env: Option<&str>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| PipelineError::generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            size: DEFAULT_SIZE.to_string(),
            api_key_env: api_key_env.unwrap_or(DEFAULT_API_KEY_ENV).to_string(),
        })
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        output_path: &Path,
    ) -> Result<(), PipelineError> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            PipelineError::generation(format!("{} is not set", self.api_key_env))
        })?;

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": self.size,
            "n": 1,
            "response_format": "b64_json",
        });

        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::generation(format!("image request failed: {e}")))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet: String = raw.chars().take(400).collect();
            warn!("image API HTTP {}: {}", status.as_u16(), snippet);
            return Err(PipelineError::generation(format!(
                "image API HTTP {}",
                status.as_u16()
            )));
        }

        let root: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::generation(format!("image response parse failed: {e}")))?;
        let b64 = root
            .get("data")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|item| item.get("b64_json"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PipelineError::generation("image response missing b64_json data".to_string())
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| PipelineError::generation(format!("image payload decode failed: {e}")))?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }
        fs::write(output_path, &bytes)
            .await
            .map_err(|e| PipelineError::generation(format!("failed to write image: {e}")))?;
        Ok(())
    }
}
