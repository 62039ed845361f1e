//! The seven research stages of the standard pipeline.
//!
//! Each stage owns one report field. Stages only talk to the outside world
//! through [`LlmProvider`] and [`SearchProvider`], and only read earlier
//! fragments from the report they are handed.

pub mod competitors;
pub mod cost_benefit;
pub mod industry;
pub mod parse;
pub mod planning;
pub mod recommendations;
pub mod resources;
pub mod use_cases;

pub use competitors::CompetitorStage;
pub use cost_benefit::CostBenefitStage;
pub use industry::IndustryResearchStage;
pub use planning::ImplementationPlanStage;
pub use recommendations::AiRecommendationStage;
pub use resources::ResourceStage;
pub use use_cases::UseCaseStage;

use crate::error::{ProviderError, RegistryError};
use crate::models::{Citation, WebResult};
use crate::pipeline::StageRegistry;
use crate::provider::{LlmProvider, SearchProvider};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Build the standard seven-stage registry in pipeline order.
pub fn default_registry(
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    max_results: usize,
) -> Result<StageRegistry, RegistryError> {
    StageRegistry::new()
        .register(Arc::new(IndustryResearchStage::new(
            llm.clone(),
            search.clone(),
            max_results,
        )))?
        .register(Arc::new(UseCaseStage::new(llm.clone())))?
        .register(Arc::new(AiRecommendationStage::new(llm.clone())))?
        .register(Arc::new(ResourceStage::new(search.clone())))?
        .register(Arc::new(CompetitorStage::new(llm.clone(), search, max_results)))?
        .register(Arc::new(ImplementationPlanStage::new(llm.clone())))?
        .register(Arc::new(CostBenefitStage::new(llm)))
}

/// Results of several concurrent searches.
#[derive(Debug, Default)]
pub(crate) struct SearchBatch {
    /// All hits, in query order.
    pub results: Vec<WebResult>,
    /// First error among the failed queries.
    pub first_error: Option<ProviderError>,
    pub failed: usize,
    pub attempted: usize,
}

impl SearchBatch {
    /// True when every query failed.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Run `queries` concurrently. A failed query contributes no hits.
pub(crate) async fn search_all(
    search: &dyn SearchProvider,
    queries: &[String],
    max_results: usize,
) -> SearchBatch {
    let outcomes = join_all(queries.iter().map(|q| search.search(q, max_results))).await;

    let mut batch = SearchBatch {
        attempted: queries.len(),
        ..SearchBatch::default()
    };
    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(results) => batch.results.extend(results),
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                batch.failed += 1;
                batch.first_error.get_or_insert(e);
            }
        }
    }
    batch
}

/// Single search where failure only degrades the context.
pub(crate) async fn search_or_empty(
    search: &dyn SearchProvider,
    query: &str,
    max_results: usize,
) -> Vec<WebResult> {
    match search.search(query, max_results).await {
        Ok(results) => results,
        Err(e) => {
            warn!("Search for '{}' failed: {}", query, e);
            Vec::new()
        }
    }
}

/// Highest-relevance hits first, one per URL, keeping the first `limit`.
pub(crate) fn top_by_relevance(mut results: Vec<WebResult>, limit: usize) -> Vec<WebResult> {
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.url.clone()));
    results.truncate(limit);
    results
}

pub(crate) fn citations_of(results: &[WebResult]) -> Vec<Citation> {
    results.iter().map(Citation::from).collect()
}
