//! External LLM and web-search collaborators.
//!
//! Stages only see the [`LlmProvider`] and [`SearchProvider`] traits; the
//! HTTP clients behind them are swapped for scripted mocks in tests.

pub mod chat;
#[cfg(test)]
pub mod mock;
pub mod search;

pub use chat::{ApiStyle, ChatClient, ChatConfig};
pub use search::{SearchConfig, TavilyClient};

use crate::error::ProviderError;
use crate::models::WebResult;
use async_trait::async_trait;

/// A chat-completion model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one prompt (optionally with a system message) and return the answer text.
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<WebResult>, ProviderError>;
}
