//! Dataset and model-hub resource collection.
//!
//! Search hits are kept only when their URL belongs to a known resource
//! domain, then ranked by `relevance * 5 * domain weight`.

use super::search_all;
use crate::error::StageFailure;
use crate::models::{Citation, Report, StageKind, StageResult, Subject, WebResult};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::SearchProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const RESULTS_PER_QUERY: usize = 3;
const MAX_RESOURCES: usize = 15;
const USE_CASE_QUERIES: usize = 3;
const OFFERING_QUERIES: usize = 2;

/// Domain weights, checked in order; the first match wins.
const RESOURCE_DOMAINS: &[(&str, f64)] = &[
    ("kaggle.com", 10.0),
    ("github.com", 9.0),
    ("huggingface.co", 8.0),
    ("paperswithcode.com", 7.0),
    ("tensorflow.org", 6.0),
    ("pytorch.org", 6.0),
    ("scikit-learn.org", 5.0),
    ("openml.org", 5.0),
    ("data.gov", 4.0),
    ("google.com/dataset", 4.0),
];

pub struct ResourceStage {
    search: Arc<dyn SearchProvider>,
}

impl ResourceStage {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }

    fn queries(subject: &Subject, prior: &Report) -> Vec<String> {
        let industry = &subject.industry;
        let mut queries = vec![
            format!("AI ML datasets resources {} industry", industry),
            format!("GitHub repositories {} machine learning", industry),
            format!("Kaggle datasets {} analysis", industry),
        ];
        queries.extend(
            prior
                .fragments
                .use_cases()
                .iter()
                .take(USE_CASE_QUERIES)
                .filter(|uc| !uc.objective.is_empty())
                .map(|uc| format!("Datasets and resources for {} in {}", uc.objective, industry)),
        );
        queries.extend(
            prior
                .fragments
                .key_offerings()
                .iter()
                .take(OFFERING_QUERIES)
                .map(|o| format!("AI ML datasets for {} in {}", o, industry)),
        );
        queries
    }
}

/// Weight of the first resource domain contained in `url`, if any.
fn domain_weight(url: &str) -> Option<f64> {
    let url = url.to_lowercase();
    RESOURCE_DOMAINS
        .iter()
        .find(|(domain, _)| url.contains(domain))
        .map(|(_, weight)| *weight)
}

/// Score hits on resource domains and return the best, highest first.
///
/// A URL is scored once, on its first occurrence. Ties keep first-seen order.
pub fn rank_resources(results: &[WebResult], limit: usize) -> Vec<&WebResult> {
    let mut scored: Vec<(&WebResult, f64)> = Vec::new();

    for result in results {
        if result.url.is_empty() || scored.iter().any(|(r, _)| r.url == result.url) {
            continue;
        }
        if let Some(weight) = domain_weight(&result.url) {
            scored.push((result, result.relevance_score * 5.0 * weight));
        }
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(r, _)| r).collect()
}

#[async_trait]
impl Stage for ResourceStage {
    fn kind(&self) -> StageKind {
        StageKind::Resources
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let queries = Self::queries(subject, prior);
        let batch = search_all(self.search.as_ref(), &queries, RESULTS_PER_QUERY).await;
        if batch.all_failed() {
            let cause = batch
                .first_error
                .map(StageFailure::from)
                .unwrap_or_else(|| StageFailure::Network("every resource search failed".to_string()));
            return Err(cause);
        }

        // Article links from the generated use cases come first.
        let mut links: Vec<String> = Vec::new();
        for url in prior.fragments.use_cases().iter().flat_map(|uc| &uc.articles) {
            if !links.contains(url) {
                links.push(url.clone());
            }
        }

        let ranked = rank_resources(&batch.results, MAX_RESOURCES);
        let citations: Vec<Citation> = ranked.iter().map(|r| Citation::from(*r)).collect();
        for result in ranked {
            if !links.contains(&result.url) {
                links.push(result.url.clone());
            }
        }

        debug!("Collected {} resource links for {}", links.len(), subject);
        Ok(StageOutput::new(StageResult::Resources(links)).with_citations(citations))
    }
}
