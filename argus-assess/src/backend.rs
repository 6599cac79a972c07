//! Inference backend abstraction
//!
//! The backend is a synchronous "prompt in, text out" capability with
//! bounded latency and no guaranteed availability. Every call carries a
//! hard timeout; the synthesizer treats all output as untrusted text.
//!
//! Two implementations: OpenAI-compatible APIs and a locally hosted Ollama
//! server.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Inference backend errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("empty response")]
    EmptyResponse,
}

/// Generic inference backend trait
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Generate a completion with a system prompt, bounded by the
    /// backend's configured timeout.
    async fn generate(&self, system: &str, user: &str) -> Result<String, InferenceError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Thread-safe reference to an inference backend
pub type SharedBackend = Arc<dyn InferenceBackend>;

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone)]
pub struct OpenAIBackendConfig {
    pub api_key: String,
    /// Base URL for OpenAI-compatible local servers
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u16,
    pub timeout: Duration,
}

impl Default for OpenAIBackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAIBackendConfig {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn local(base_url: &str, model: &str) -> Self {
        Self {
            api_key: "sk-local".to_string(),
            base_url: Some(base_url.to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible inference backend
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    config: OpenAIBackendConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIBackendConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        let client = Client::with_config(openai_config);
        Self { client, config }
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| InferenceError::Api(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| InferenceError::Api(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| InferenceError::Api(e.to_string()))?;

        let response = timeout(self.config.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| InferenceError::Timeout(self.config.timeout))?
            .map_err(|e| InferenceError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Host, e.g. `http://localhost:11434`
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

/// Locally hosted Ollama backend (`/api/generate`)
pub struct OllamaBackend {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": format!("{system}\n\n{user}"),
            "stream": false,
            "options": {"temperature": self.config.temperature},
        });

        let request = self
            .client
            .post(format!("{}/api/generate", self.config.host))
            .json(&body)
            .send();

        let response = timeout(self.config.timeout, request)
            .await
            .map_err(|_| InferenceError::Timeout(self.config.timeout))?
            .map_err(|e| InferenceError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api(format!("ollama {status}: {text}")));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;

        parsed
            .response
            .filter(|s| !s.trim().is_empty())
            .ok_or(InferenceError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Create a shared OpenAI-compatible backend
pub fn create_openai_backend(config: OpenAIBackendConfig) -> SharedBackend {
    Arc::new(OpenAIBackend::new(config))
}

/// Create a shared Ollama backend
pub fn create_ollama_backend(config: OllamaConfig) -> SharedBackend {
    Arc::new(OllamaBackend::new(config))
}
