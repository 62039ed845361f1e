//! Industry research: key offerings, market trends, and the web context
//! every later stage builds on.

use super::parse::{extract_json_array, extract_trends, string_list, web_context};
use super::{citations_of, search_all, search_or_empty, top_by_relevance};
use crate::error::StageFailure;
use crate::models::{IndustryResearch, Report, StageKind, StageResult, Subject};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::{LlmProvider, SearchProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Web results kept in the fragment.
const TOP_RESULTS: usize = 10;
/// Offerings that get their own trend query.
const OFFERING_QUERIES: usize = 2;

pub struct IndustryResearchStage {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl IndustryResearchStage {
    pub fn new(llm: Arc<dyn LlmProvider>, search: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            llm,
            search,
            max_results,
        }
    }

    /// Ask the model for the company's main offerings.
    ///
    /// Failures here only leave the list empty; the trend analysis still runs.
    async fn discover_offerings(&self, subject: &Subject) -> Vec<String> {
        let hits = search_or_empty(
            self.search.as_ref(),
            &format!(
                "{} main products services offerings {}",
                subject.company, subject.industry
            ),
            self.max_results,
        )
        .await;

        let prompt = format!(
            "Based on the following information about {company} in the {industry} industry, \
list their main products, services, and key offerings.

Information:
{context}

Return the key offerings as a JSON array of strings, for example:
[\"Product 1\", \"Service 1\", \"Technology 1\"]

Include only current, verified offerings (typically 3-7 items).",
            company = subject.company,
            industry = subject.industry,
            context = web_context(&hits, false, None),
        );

        match self.llm.complete(None, &prompt).await {
            Ok(answer) => match extract_json_array(&answer) {
                Some(list) => string_list(&list),
                None => {
                    warn!("No offerings list in model answer for {}", subject);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Offering discovery failed for {}: {}", subject, e);
                Vec::new()
            }
        }
    }

    fn trend_queries(subject: &Subject, offerings: &[String]) -> Vec<String> {
        let mut queries = vec![
            format!(
                "Latest AI and technology trends in {} industry",
                subject.industry
            ),
            format!(
                "Top technological innovations for {} {}",
                subject.company, subject.industry
            ),
            format!(
                "AI and machine learning applications in {}",
                subject.industry
            ),
        ];
        queries.extend(
            offerings
                .iter()
                .take(OFFERING_QUERIES)
                .map(|o| format!("AI technology trends {} in {}", o, subject.industry)),
        );
        queries
    }
}

#[async_trait]
impl Stage for IndustryResearchStage {
    fn kind(&self) -> StageKind {
        StageKind::IndustryResearch
    }

    async fn run(&self, subject: &Subject, _prior: &Report) -> Result<StageOutput, StageFailure> {
        let key_offerings = self.discover_offerings(subject).await;
        debug!("Found {} offerings for {}", key_offerings.len(), subject);

        let queries = Self::trend_queries(subject, &key_offerings);
        let batch = search_all(self.search.as_ref(), &queries, self.max_results).await;
        let web_results = top_by_relevance(batch.results, TOP_RESULTS);

        let offerings = key_offerings.join(", ");
        let prompt = format!(
            "Analyze the following information for {company} in the {industry} industry.

Company Key Offerings: {offerings}

Web Search Results:
{context}

Provide a comprehensive analysis including:
1. Detailed market trends (list format)
2. Technological landscape overview, especially relating to their key offerings: {offerings}
3. Potential AI/ML opportunities specific to their offerings
4. Competitive insights
5. Emerging technologies relevant to their market position

Format the market trends as a clear, numbered list.",
            company = subject.company,
            industry = subject.industry,
            offerings = offerings,
            context = web_context(&web_results, true, None),
        );

        let insights = self.llm.complete(None, &prompt).await?;
        let market_trends = extract_trends(&insights);

        let citations = citations_of(&web_results);
        Ok(StageOutput::new(StageResult::IndustryResearch(IndustryResearch {
            key_offerings,
            market_trends,
            insights,
            web_results,
        }))
        .with_citations(citations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::mock::{web_hit, ScriptedLlm, StaticSearch};
    use chrono::Utc;

    const ANALYSIS: &str = "Market overview\n1. Self-checkout adoption is accelerating\n2. Retail media networks keep growing\nMore detail follows.";

    fn empty_report(subject: &Subject) -> Report {
        Report::pending(subject.clone(), &StageKind::ALL, Utc::now())
    }

    #[tokio::test]
    async fn test_collects_offerings_trends_and_results() {
        let llm = Arc::new(
            ScriptedLlm::new(ANALYSIS).rule("key offerings as a JSON array", "[\"Groceries\", \"Pharmacy\", \"Fuel\"]"),
        );
        let hits: Vec<_> = (0..12)
            .map(|i| web_hit(&format!("Hit {}", i), &format!("https://hit/{}", i), i as f64 / 12.0))
            .collect();
        let search = Arc::new(StaticSearch::new(hits));
        let stage = IndustryResearchStage::new(llm.clone(), search.clone(), 12);
        let subject = Subject::new("Acme Corp", "Retail");

        let output = stage.run(&subject, &empty_report(&subject)).await.unwrap();

        let StageResult::IndustryResearch(research) = output.result else {
            panic!("unexpected fragment kind");
        };
        assert_eq!(research.key_offerings, vec!["Groceries", "Pharmacy", "Fuel"]);
        assert_eq!(research.market_trends.len(), 2);
        assert_eq!(research.insights, ANALYSIS);
        assert_eq!(research.web_results.len(), TOP_RESULTS);
        assert_eq!(research.web_results[0].url, "https://hit/11");
        assert_eq!(output.citations.len(), TOP_RESULTS);

        // One offerings search plus three general and two offering queries.
        assert_eq!(search.calls(), 6);
        assert!(search
            .queries()
            .iter()
            .any(|q| q == "AI technology trends Groceries in Retail"));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_offering_failure_does_not_fail_stage() {
        let llm = Arc::new(ScriptedLlm::new(ANALYSIS).rule("key offerings as a JSON array", "no idea"));
        let search = Arc::new(StaticSearch::failing());
        let stage = IndustryResearchStage::new(llm, search.clone(), 5);
        let subject = Subject::new("Acme Corp", "Retail");

        let output = stage.run(&subject, &empty_report(&subject)).await.unwrap();

        let StageResult::IndustryResearch(research) = output.result else {
            panic!("unexpected fragment kind");
        };
        assert!(research.key_offerings.is_empty());
        assert!(research.web_results.is_empty());
        assert_eq!(search.calls(), 4);
    }

    #[tokio::test]
    async fn test_analysis_failure_fails_stage() {
        let llm = Arc::new(ScriptedLlm::failing(ProviderError::Quota("429".to_string())));
        let stage = IndustryResearchStage::new(llm, Arc::new(StaticSearch::new(vec![])), 5);
        let subject = Subject::new("Acme Corp", "Retail");

        let err = stage.run(&subject, &empty_report(&subject)).await.unwrap_err();
        assert_eq!(err, StageFailure::Quota("429".to_string()));
    }
}
