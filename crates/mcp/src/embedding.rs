//! Query embedding providers backed by the Gemini `embedContent` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use puddle_core::config::{EmbeddingConfig, EmbeddingProviderKind};
use puddle_core::discovery::EmbeddingProvider;
use puddle_core::errors::ApplicationError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;

pub fn from_config(config: &EmbeddingConfig) -> Result<SharedEmbedder, ApplicationError> {
    match config.provider {
        EmbeddingProviderKind::Gemini => Ok(Arc::new(GeminiEmbedder::from_config(config)?)),
        EmbeddingProviderKind::Disabled => Ok(Arc::new(DisabledEmbedder)),
    }
}

#[derive(Clone)]
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: u32,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ApplicationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ApplicationError::Configuration("embedding.api_key is required for gemini".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "taskType": "SEMANTIC_SIMILARITY",
            "outputDimensionality": self.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|error| ApplicationError::Integration(format!("embedding request: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Integration(format!(
                "embedding provider returned HTTP {status}"
            )));
        }

        let payload: EmbedContentResponse = response.json().await.map_err(|error| {
            ApplicationError::Integration(format!("embedding response: {error}"))
        })?;
        let values = payload.embedding.values;
        if values.len() != self.dimensions as usize {
            return Err(ApplicationError::Integration(format!(
                "embedding has {} dimensions, expected {}",
                values.len(),
                self.dimensions
            )));
        }

        debug!(event_name = "embedding.completed", dimensions = values.len(), "query embedded");
        Ok(values)
    }
}

/// Always fails, so semantic search runs in its degraded store-order mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApplicationError> {
        Err(ApplicationError::Integration("embedding provider is disabled".to_string()))
    }
}
