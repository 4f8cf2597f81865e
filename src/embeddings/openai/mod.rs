
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Vector width produced by the default embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

/// Environment variable holding the API credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const CHAT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_base: String,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl OpenAiClient {
    /// Create a client using the API key from the environment
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
            anyhow::anyhow!(
                "{} is not set. Export it or add it to a .env file before indexing or searching.",
                API_KEY_VAR
            )
        })?;

        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key
    #[inline]
    pub fn with_api_key(config: &Config, api_key: String) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            api_base: config.openai.api_base.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.openai.embedding_model.clone(),
            chat_model: config.openai.chat_model.clone(),
            batch_size: config.openai.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Test connection to the API and verify the configured models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for OpenAI API at {}", self.api_base);

        let models = self.list_models().context("Failed to list models")?;

        for wanted in [&self.embedding_model, &self.chat_model] {
            if !models.iter().any(|m| &m.id == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                ));
            }
        }

        info!(
            "Health check passed for {} with models {} and {}",
            self.api_base, self.embedding_model, self.chat_model
        );
        Ok(())
    }

    /// List the models available to this API key
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/models");

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(&url)
                    .header("Authorization", &format!("Bearer {}", self.api_key))
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.data.len());
        Ok(models_response.data)
    }

    /// Generate an embedding for a single query string
    #[inline]
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for query (length: {})", text.len());

        let input = [text.to_string()];
        let mut embeddings = self.embed_texts(&input)?;

        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no vectors"))
    }

    /// Generate embeddings for multiple texts using batch processing
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to stay under the API request size limits
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .embed_texts(chunk)
                .with_context(|| format!("Failed to embed batch of {} texts", chunk.len()))?;

            results.extend(batch);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let url = self.endpoint("/embeddings");
        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(&url)
                    .header("Authorization", &format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embeddings")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if embed_response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                embed_response.data.len()
            ));
        }

        // Each vector carries the index of the input it belongs to
        let mut data = embed_response.data;
        data.sort_by_key(|d| d.index);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Ask the chat model to complete a single user prompt
    #[inline]
    pub fn chat_completion(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting chat completion (prompt length: {})",
            prompt.len()
        );

        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: CHAT_TEMPERATURE,
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        let url = self.endpoint("/chat/completions");
        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(&url)
                    .header("Authorization", &format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate chat completion")?;

        let chat_response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no choices"))?;

        debug!("Received chat completion ({} chars)", content.len());
        Ok(content)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Retryable HTTP status {}, attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else if *status == 401 {
                                warn!("Authentication failed (status 401), not retrying");
                                return Err(anyhow::anyhow!(
                                    "Authentication failed: HTTP 401. Check that {} holds a valid key.",
                                    API_KEY_VAR
                                ));
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    // Wait before retry (exponential backoff)
                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.api_base);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}
