//! Scripted providers for tests.

use crate::error::ProviderError;
use crate::models::WebResult;
use crate::provider::{LlmProvider, SearchProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// LLM that answers from a list of `(needle, response)` rules.
///
/// The first rule whose needle occurs in the prompt wins; otherwise the
/// default response is returned.
pub struct ScriptedLlm {
    rules: Vec<(String, String)>,
    default_response: String,
    failure: Option<ProviderError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(default_response: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_response: default_response.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new("")
        }
    }

    pub fn rule(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _system: Option<&str>, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(ref error) = self.failure {
            return Err(error.clone());
        }

        let response = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        if response.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Search backend returning a fixed hit list for every query.
pub struct StaticSearch {
    hits: Vec<WebResult>,
    failing: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(hits: Vec<WebResult>) -> Self {
        Self {
            hits,
            failing: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        if self.failing {
            return Err(ProviderError::Network("search offline".to_string()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Convenience constructor for search hits.
pub fn web_hit(title: &str, url: &str, score: f64) -> WebResult {
    WebResult {
        title: title.to_string(),
        url: url.to_string(),
        content: format!("Content about {}", title),
        relevance_score: score,
    }
}
