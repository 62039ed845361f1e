//! Tavily web search client with a short-lived query cache.

use crate::error::ProviderError;
use crate::models::WebResult;
use crate::provider::SearchProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum characters of page content kept per hit.
const MAX_CONTENT_CHARS: usize = 1000;

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    /// How long identical queries are answered from memory.
    pub cache_ttl: Duration,
    /// Maximum number of cached queries.
    pub cache_size: usize,
    /// Attempts per query before giving up.
    pub retries: usize,
    /// Delay before the first retry; doubles on each attempt.
    pub retry_delay: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: String::new(),
            timeout_seconds: 60,
            cache_ttl: Duration::from_secs(3600),
            cache_size: 100,
            retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    score: f64,
}

impl From<TavilyHit> for WebResult {
    fn from(hit: TavilyHit) -> Self {
        let body = hit
            .raw_content
            .filter(|c| !c.is_empty())
            .or(hit.content)
            .unwrap_or_default();

        let content = if body.chars().count() > MAX_CONTENT_CHARS {
            let truncated: String = body.chars().take(MAX_CONTENT_CHARS).collect();
            format!("{}...", truncated)
        } else {
            body
        };

        WebResult {
            title: hit.title.unwrap_or_else(|| "No Title".to_string()),
            url: hit.url,
            content,
            relevance_score: hit.score,
        }
    }
}

/// In-memory cache of recent query results, evicting the oldest entry when full.
struct QueryCache {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, (Instant, Vec<WebResult>)>,
}

impl QueryCache {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
        }
    }

    fn key(query: &str, max_results: usize) -> String {
        format!("{}:{}", query, max_results)
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<Vec<WebResult>> {
        let (stored_at, results) = self.entries.get(key)?;
        if now.saturating_duration_since(*stored_at) <= self.ttl {
            debug!("Search cache hit for {}", key);
            return Some(results.clone());
        }
        debug!("Search cache expired for {}", key);
        self.entries.remove(key);
        None
    }

    fn insert(&mut self, key: String, results: Vec<WebResult>, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (now, results));
    }
}

/// Tavily search API client.
pub struct TavilyClient {
    config: SearchConfig,
    http_client: reqwest::Client,
    cache: Mutex<QueryCache>,
}

impl TavilyClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let cache = Mutex::new(QueryCache::new(config.cache_ttl, config.cache_size));

        Ok(Self {
            config,
            http_client,
            cache,
        })
    }

    fn cached(&self, key: &str) -> Option<Vec<WebResult>> {
        match self.cache.lock() {
            Ok(mut cache) => cache.get(key, Instant::now()),
            Err(_) => None,
        }
    }

    fn remember(&self, key: String, results: &[WebResult]) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, results.to_vec(), Instant::now());
        }
    }

    async fn search_once(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .json(&TavilyRequest {
                api_key: &self.config.api_key,
                query,
                max_results,
                include_answer: true,
                include_raw_content: true,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network(format!(
                        "search timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else {
                    ProviderError::Network(format!("search request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Quota("search rate limit reached".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Network(format!(
                "search API error {}: {}",
                status, body
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(parsed.results.into_iter().map(WebResult::from).collect())
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError> {
        let query = query.trim().to_lowercase();
        let key = QueryCache::key(&query, max_results);

        if let Some(results) = self.cached(&key) {
            return Ok(results);
        }

        let attempts = self.config.retries.max(1);
        let mut delay = self.config.retry_delay;
        let mut last_error = ProviderError::Network("search not attempted".to_string());

        for attempt in 1..=attempts {
            match self.search_once(&query, max_results).await {
                Ok(results) => {
                    if !results.is_empty() {
                        self.remember(key, &results);
                    }
                    return Ok(results);
                }
                Err(e) => {
                    warn!(
                        "Web search error (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = next_delay(delay);
                    }
                }
            }
        }

        Err(last_error)
    }
}

/// Doubled retry delay, capped at `Duration::MAX`.
fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_without_overflow() {
        assert_eq!(next_delay(Duration::from_secs(2)), Duration::from_secs(4));
        assert_eq!(next_delay(Duration::from_secs(u64::MAX)), Duration::MAX);
    }

    fn hit(url: &str) -> WebResult {
        WebResult {
            title: "t".to_string(),
            url: url.to_string(),
            content: String::new(),
            relevance_score: 0.5,
        }
    }

    #[test]
    fn test_query_cache_ttl() {
        let mut cache = QueryCache::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        cache.insert("q:5".to_string(), vec![hit("https://a")], start);

        assert!(cache.get("q:5", start + Duration::from_secs(30)).is_some());
        assert!(cache.get("q:5", start + Duration::from_secs(61)).is_none());
        // Expired entries are dropped on access.
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn test_query_cache_evicts_oldest() {
        let mut cache = QueryCache::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        cache.insert("a".to_string(), vec![hit("https://a")], start);
        cache.insert(
            "b".to_string(),
            vec![hit("https://b")],
            start + Duration::from_secs(1),
        );
        cache.insert(
            "c".to_string(),
            vec![hit("https://c")],
            start + Duration::from_secs(2),
        );

        assert_eq!(cache.entries.len(), 2);
        assert!(!cache.entries.contains_key("a"));
        assert!(cache.entries.contains_key("c"));
    }

    #[test]
    fn test_hit_content_is_truncated() {
        let long = "x".repeat(1500);
        let result = WebResult::from(TavilyHit {
            title: None,
            url: "https://example.com".to_string(),
            content: Some("short".to_string()),
            raw_content: Some(long),
            score: 0.9,
        });

        assert_eq!(result.title, "No Title");
        assert_eq!(result.content.chars().count(), MAX_CONTENT_CHARS + 3);
        assert!(result.content.ends_with("..."));
    }

    #[test]
    fn test_hit_falls_back_to_snippet() {
        let result = WebResult::from(TavilyHit {
            title: Some("Title".to_string()),
            url: "https://example.com".to_string(),
            content: Some("snippet".to_string()),
            raw_content: None,
            score: 0.1,
        });
        assert_eq!(result.content, "snippet");
    }
}
