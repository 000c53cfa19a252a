/*!
 * Ollama client.
 *
 * Talks to the `/api/chat` and `/api/embeddings` endpoints of a local or
 * remote Ollama server. Retrying is left to the caller; this client maps
 * every transport and HTTP failure to a typed `ProviderError` so the
 * session can tell transient failures from permanent ones.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{Embedder, ModelRequest, Role, TranslationModel};

/// Ollama client for interacting with the Ollama API
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: Url,
    /// HTTP client for making requests
    client: Client,
    /// Chat model name
    model: String,
    /// Sampling temperature
    temperature: Option<f32>,
    /// How long to keep the model loaded between calls
    keep_alive: Option<String>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Embeddings response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

impl Ollama {
    /// Create a client for `endpoint` (host, host:port or full URL).
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = normalize_endpoint(endpoint, 11434)?;
        let client = Client::builder()
            .timeout(timeout)
            // Ollama speaks HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            model: model.into(),
            temperature: None,
            keep_alive: None,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint path {}: {}", path, e)))
    }

    /// Build the chat payload for a model request.
    pub fn chat_request(&self, request: &ModelRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system_text(),
        });
        messages.extend(request.turns.iter().map(|turn| ChatMessage {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Model => "assistant".to_string(),
            },
            content: turn.content.clone(),
        }));

        ChatRequest {
            model: self.model.clone(),
            messages,
            options: self.temperature.map(|t| GenerationOptions {
                temperature: Some(t),
                num_predict: None,
            }),
            stream: false,
            keep_alive: self.keep_alive.clone(),
        }
    }

    /// Chat with the Ollama API
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = self.endpoint("api/chat")?;
        let body = self.post(url, request).await?;
        parse_chat_response(&body)
    }

    /// Generate an embedding with the given model
    pub async fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>, ProviderError> {
        let url = self.endpoint("api/embeddings")?;
        let body = self.post(url, &EmbeddingRequest { model, prompt }).await?;
        let response: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse embeddings response: {}", e))
        })?;
        if response.embedding.is_empty() {
            return Err(ProviderError::ParseError("Empty embedding vector".to_string()));
        }
        Ok(response.embedding)
    }

    /// Get the Ollama server version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = self.endpoint("api/version")?;
        let response = self.client.get(url).send().await.map_err(map_transport_error)?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse version response: {}", e)))?;
        value["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }

    async fn post<T: Serialize + ?Sized>(&self, url: Url, payload: &T) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            error!("Ollama API error ({}): {}", status, truncate(&body, 500));
            return Err(map_status_error(status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl TranslationModel for Ollama {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ProviderError> {
        let payload = self.chat_request(request);
        let response = self.chat(&payload).await?;
        debug!(
            "Ollama {} replied with {} chars (prompt tokens: {:?}, eval tokens: {:?})",
            response.model,
            response.message.content.len(),
            response.prompt_eval_count,
            response.eval_count
        );
        Ok(response.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Embedding adapter over an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: Ollama, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.client.embed(&self.model, text).await
    }
}

/// Turn a host, `host:port` or URL into a base URL with a scheme and port.
pub fn normalize_endpoint(endpoint: &str, default_port: u16) -> Result<Url, ProviderError> {
    let trimmed = endpoint.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
    if url.host_str().is_none() {
        return Err(ProviderError::ConnectionError(format!(
            "Endpoint '{}' has no host",
            endpoint
        )));
    }
    if url.port().is_none() && url.scheme() == "http" {
        url.set_port(Some(default_port)).map_err(|_| {
            ProviderError::ConnectionError(format!("Cannot set port on endpoint '{}'", endpoint))
        })?;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse a chat response, accepting a streamed JSONL body as well.
pub fn parse_chat_response(body: &str) -> Result<ChatResponse, ProviderError> {
    match serde_json::from_str::<ChatResponse>(body) {
        Ok(response) => Ok(response),
        Err(e) => {
            // Streamed body: concatenate the content of every line
            let mut content = String::new();
            let mut model = String::new();
            let mut parsed_any = false;
            for line in body.lines().filter(|l| !l.trim().is_empty()) {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
                    continue;
                };
                parsed_any = true;
                if let Some(part) = value["message"]["content"].as_str() {
                    content.push_str(part);
                }
                if let Some(name) = value["model"].as_str() {
                    model = name.to_string();
                }
            }

            if !parsed_any {
                error!("Failed to parse Ollama chat response: {}. Raw: {}", e, truncate(body, 500));
                return Err(ProviderError::ParseError(format!(
                    "Failed to parse chat response: {}",
                    e
                )));
            }

            Ok(ChatResponse {
                model,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                done: true,
                prompt_eval_count: None,
                eval_count: None,
            })
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::ConnectionError(e.to_string())
    } else {
        ProviderError::RequestFailed(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(body),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
