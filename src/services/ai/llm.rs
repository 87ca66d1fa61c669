use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ResultExt};
use crate::services::GeminiConfig;
use crate::traits::{Embedder, TextGenerator};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini REST client. One instance serves both generation and embedding.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    enabled: bool,
    base_url: String,
    generation_model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .config_err("build http client")?;

        Ok(Self {
            client,
            api_key: config.provider.api_key.trim().to_string(),
            enabled: config.provider.enabled,
            base_url: build_base_url(config.provider.base_url.as_deref()),
            generation_model: config.generation_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        if !self.enabled {
            return Err(AppError::Config("gemini provider is disabled".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(AppError::Config("missing gemini api key".to_string()));
        }
        Ok(&self.api_key)
    }

    async fn post_json<Req, Resp>(&self, url: String, request: &Req, what: &str) -> AppResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .dependency_err(&format!("gemini {what} request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Dependency(format!(
                "gemini {what} request failed: {status} {body}"
            )));
        }

        response
            .json()
            .await
            .dependency_err(&format!("gemini {what} response invalid"))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let request = GeminiGenerateRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::text(prompt.to_string())],
            }],
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.generation_model
        );

        let response: GeminiGenerateResponse = self.post_json(url, &request, "generate").await?;
        let output = response.text();
        if output.trim().is_empty() {
            return Err(AppError::Dependency("gemini response missing text".to_string()));
        }

        tracing::debug!(
            model = %self.generation_model,
            chars = output.len(),
            "Generation completed"
        );
        Ok(output)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let request = GeminiEmbedRequest {
            content: GeminiContentParts {
                parts: vec![GeminiPart::text(text.to_string())],
            },
        };
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, self.embedding_model
        );

        let response: GeminiEmbedResponse = self.post_json(url, &request, "embed").await?;
        let values = response.embedding.values;
        if values.is_empty() {
            return Err(AppError::Dependency("gemini returned an empty embedding".to_string()));
        }
        Ok(values)
    }
}

fn build_base_url(base_url: Option<&str>) -> String {
    let base = base_url
        .unwrap_or(DEFAULT_GEMINI_BASE_URL)
        .trim()
        .trim_end_matches('/');
    if base.is_empty() {
        DEFAULT_GEMINI_BASE_URL.to_string()
    } else {
        base.to_string()
    }
}

#[derive(Serialize)]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiContentParts {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self { text }
    }
}

#[derive(Serialize)]
struct GeminiEmbedRequest {
    content: GeminiContentParts,
}

#[derive(Deserialize)]
struct GeminiGenerateResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

impl GeminiGenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> String {
        let mut output = String::new();
        if let Some(candidate) = self.candidates.and_then(|list| list.into_iter().next()) {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text {
                        output.push_str(&text);
                    }
                }
            }
        }
        output
    }
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbeddingValues,
}

#[derive(Deserialize)]
struct GeminiEmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}
