//! AI/ML use-case generation from the industry context.

use super::parse::{extract_use_cases, web_context};
use super::{citations_of, top_by_relevance};
use crate::error::StageFailure;
use crate::models::{Report, StageKind, StageResult, Subject};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const CONTEXT_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 300;

pub struct UseCaseStage {
    llm: Arc<dyn LlmProvider>,
}

impl UseCaseStage {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn system_prompt(subject: &Subject) -> String {
        format!(
            "You are an AI/ML solution architect specializing in the {industry} industry. \
You create specific, high-value AI/ML use cases for businesses based on their market context.

Focus on practical, implementable use cases with clear business impact and name concrete AI techniques. \
Use cases should be innovative but achievable with current technology.

Tailor every use case to {company}'s offerings and industry position, \
and format your response exactly as the prompt specifies.",
            industry = subject.industry,
            company = subject.company,
        )
    }
}

fn or_default(items: &[String], fallback: &[&str]) -> String {
    if items.is_empty() {
        fallback.join(", ")
    } else {
        items.join(", ")
    }
}

#[async_trait]
impl Stage for UseCaseStage {
    fn kind(&self) -> StageKind {
        StageKind::UseCases
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let web_results = prior
            .fragments
            .industry_research
            .as_ref()
            .map(|r| top_by_relevance(r.web_results.clone(), CONTEXT_RESULTS))
            .unwrap_or_default();

        let prompt = format!(
            "Generate 3-5 innovative AI/ML use cases for {company} in the {industry} industry.

Company Information:
- Company: {company}
- Industry: {industry}
- Key Offerings: {offerings}

Market Context:
{context}

Market Trends:
{trends}

For each use case:
1. Give it a clear, specific title.
2. State the concrete business objective it addresses.
3. Describe precisely how AI/ML is applied (techniques and implementation approach).
4. List 3-5 cross-functional benefits across departments.
5. Include reference links to articles (URLs).

Format each use case like this example:

Use Case 1: Predictive Maintenance System
Objective/Use Case: Reduce equipment downtime by 40% with predictive maintenance.
AI Application: LSTM networks and random forests over sensor streams predict failures 2-3 weeks ahead.
Cross-Functional Benefits:
- Operations: 40% less unplanned downtime
- Finance: 30% lower maintenance costs
- Supply Chain: spare-part inventory driven by predicted failures
Articles: https://example.com/article1, https://example.com/article2",
            company = subject.company,
            industry = subject.industry,
            offerings = or_default(prior.fragments.key_offerings(), &["Products", "Services"]),
            context = web_context(&web_results, true, Some(SNIPPET_CHARS)),
            trends = or_default(
                prior.fragments.market_trends(),
                &["Industry growth", "Digital transformation"]
            ),
        );

        let answer = self
            .llm
            .complete(Some(&Self::system_prompt(subject)), &prompt)
            .await?;

        let use_cases = extract_use_cases(&answer, &subject.company);
        if use_cases.is_empty() {
            return Err(StageFailure::Empty);
        }
        debug!("Generated {} use cases for {}", use_cases.len(), subject);

        Ok(StageOutput::new(StageResult::UseCases(use_cases)).with_citations(citations_of(&web_results)))
    }
}
