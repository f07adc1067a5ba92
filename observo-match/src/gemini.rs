//! Gemini embedding provider using the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{MatchError, Result};

/// The Generative Language API base URL.
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_MODEL: &str = "models/text-embedding-004";

/// The dimensionality of `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

/// Largest batch accepted by `batchEmbedContents`.
const MAX_BATCH: usize = 100;

const PROVIDER: &str = "Gemini";

/// An [`EmbeddingProvider`] backed by the Gemini embeddings API.
///
/// Queries are embedded with the `RETRIEVAL_QUERY` task type and stored
/// passages with `RETRIEVAL_DOCUMENT`.
///
/// # Example
///
/// ```rust,ignore
/// use observo_match::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::from_env()?;
/// let embedding = provider.embed_query("rural broadband nonprofit").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(MatchError::ConfigError("Gemini API key must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            MatchError::ConfigError("GEMINI_API_KEY environment variable not set".into())
        })?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `models/gemini-embedding-001`).
    ///
    /// The embedding width follows the model's default unless
    /// [`with_output_dimensionality`](Self::with_output_dimensionality) was
    /// called first.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::ConfigError`] for a model whose default width is
    /// unknown when no output dimensionality has been requested.
    pub fn with_model(mut self, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let model = if model.starts_with("models/") { model } else { format!("models/{model}") };
        match (self.request_dimensions, default_dimensions(&model)) {
            (Some(_), _) => {}
            (None, Some(dims)) => self.dimensions = dims,
            (None, None) => {
                return Err(MatchError::ConfigError(format!(
                    "unknown embedding width for {model}; set the output dimensionality"
                )));
            }
        }
        self.model = model;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request truncated output vectors of `dims` dimensions.
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point the client at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request<'a>(&'a self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content { parts: vec![Part { text }] },
            task_type,
            output_dimensionality: self.request_dimensions,
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{}:{method}", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                MatchError::retrieval(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(MatchError::retrieval(
                PROVIDER,
                format!("API returned {status}: {detail}"),
            ));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            MatchError::retrieval(PROVIDER, format!("failed to parse response: {e}"))
        })
    }
}

/// Default output width of the embedding models we know about.
fn default_dimensions(model: &str) -> Option<usize> {
    match model.trim_start_matches("models/") {
        "text-embedding-004" | "embedding-001" => Some(768),
        "gemini-embedding-001" | "gemini-embedding-exp-03-07" => Some(3072),
        _ => None,
    }
}

// ── Gemini API request/response types ─────────────────────────────

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding query");

        let body = self.request(text, TaskType::RetrievalQuery);
        let response: EmbedContentResponse = self.post("embedContent", &body).await?;
        Ok(response.embedding.values)
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(provider = PROVIDER, batch_size = batch.len(), model = %self.model, "embedding batch");

            let body = BatchEmbedContentsRequest {
                requests: batch
                    .iter()
                    .map(|text| self.request(text, TaskType::RetrievalDocument))
                    .collect(),
            };
            let response: BatchEmbedContentsResponse =
                self.post("batchEmbedContents", &body).await?;

            if response.embeddings.len() != batch.len() {
                return Err(MatchError::retrieval(
                    PROVIDER,
                    format!(
                        "expected {} embeddings, API returned {}",
                        batch.len(),
                        response.embeddings.len()
                    ),
                ));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
