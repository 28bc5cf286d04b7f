//! OpenAI-compatible remote embedding provider (§4.6 `[AMBIENT]`): a
//! `reqwest::Client`, a bearer token read from an environment variable if
//! not passed explicitly, and a typed request/response pair.

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};

/// Read when no explicit API key is supplied.
pub const API_KEY_ENV_VAR: &str = "TRACEAI_EMBEDDING_API_KEY";

pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .unwrap_or_default();
        RemoteEmbeddingProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        let request = EmbeddingsRequest { model: &self.model, input: text };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorError::EmbeddingFailed {
                provider: self.name().to_string(),
                detail: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorError::EmbeddingFailed {
                provider: self.name().to_string(),
                detail: format!("http {status}: {body}"),
            });
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| VectorError::EmbeddingFailed {
            provider: self.name().to_string(),
            detail: format!("invalid response body: {e}"),
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| VectorError::EmbeddingFailed {
                provider: self.name().to_string(),
                detail: "response contained no embedding data".to_string(),
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "remote-openai-compatible"
    }
}
