//! Chat-completion client for Ollama and OpenAI-compatible endpoints.

use crate::error::ProviderError;
use crate::provider::LlmProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Wire format of the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` (OpenRouter, LM Studio, ...)
    Openai,
}

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_style: ApiStyle,
    pub base_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_style: ApiStyle::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// OpenAI-compatible chat request.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

/// HTTP chat client.
pub struct ChatClient {
    config: ChatConfig,
    http_client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.api_style {
            ApiStyle::Ollama => format!("{}/api/chat", base),
            ApiStyle::Openai if base.ends_with("/v1") => format!("{}/chat/completions", base),
            ApiStyle::Openai => format!("{}/v1/chat/completions", base),
        }
    }

    fn messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        messages
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Network(format!(
                "request timed out after {}s",
                self.config.timeout_seconds
            ))
        } else if e.is_connect() {
            ProviderError::Network(format!("cannot connect to {}", self.config.base_url))
        } else {
            ProviderError::Network(format!("failed to send request: {}", e))
        }
    }
}

#[async_trait]
impl LlmProvider for ChatClient {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, ProviderError> {
        let url = self.endpoint();
        let messages = Self::messages(system, prompt);

        debug!("Sending chat request to {} ({} chars)", url, prompt.len());

        let request = match self.config.api_style {
            ApiStyle::Ollama => self.http_client.post(&url).json(&OllamaChatRequest {
                model: &self.config.model_name,
                messages,
                stream: false,
                options: OllamaOptions {
                    temperature: self.config.temperature,
                },
            }),
            ApiStyle::Openai => self.http_client.post(&url).json(&OpenAiChatRequest {
                model: &self.config.model_name,
                messages,
                temperature: self.config.temperature,
            }),
        };

        let request = match self.config.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        };

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Quota(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Network(format!(
                "chat API error {}: {}",
                status, body
            )));
        }

        let content = match self.config.api_style {
            ApiStyle::Ollama => response
                .json::<OllamaChatResponse>()
                .await
                .map(|r| r.message.content)
                .map_err(|e| ProviderError::Malformed(e.to_string()))?,
            ApiStyle::Openai => response
                .json::<OpenAiChatResponse>()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| ProviderError::Malformed("no choices in response".to_string()))?,
        };

        if content.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
