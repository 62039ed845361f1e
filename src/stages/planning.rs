//! Implementation roadmaps, one per use case.

use super::parse::{describe_use_case, extract_json_object};
use crate::error::{ProviderError, StageFailure};
use crate::models::{PlannedUseCase, Report, StageKind, StageResult, Subject, UseCase};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ImplementationPlanStage {
    llm: Arc<dyn LlmProvider>,
}

impl ImplementationPlanStage {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn prompt(use_case: &UseCase, industry: &str) -> String {
        format!(
            "Create a detailed implementation roadmap for the following AI use case in the {industry} industry:

{use_case}

Answer with JSON only, no code fences:
{{
    \"phases\": [
        {{
            \"name\": \"Phase name\",
            \"duration\": \"Expected duration (e.g., 2-3 months)\",
            \"activities\": [\"Activity 1\", \"Activity 2\"],
            \"deliverables\": [\"Deliverable 1\", \"Deliverable 2\"],
            \"resources_needed\": [\"Resource 1\", \"Resource 2\"],
            \"key_stakeholders\": [\"Stakeholder 1\", \"Stakeholder 2\"],
            \"risks\": [\"Risk 1\", \"Risk 2\"],
            \"success_metrics\": [\"Metric 1\", \"Metric 2\"]
        }}
    ],
    \"estimated_timeline\": \"Overall timeline (e.g., 9-12 months)\",
    \"key_dependencies\": [\"Dependency 1\", \"Dependency 2\"],
    \"implementation_challenges\": [\"Challenge 1\", \"Challenge 2\"],
    \"success_criteria\": [\"Criterion 1\", \"Criterion 2\"]
}}

Include 3-4 phases (e.g., Planning, Development, Testing, Deployment) with realistic timelines and resource requirements.",
            industry = industry,
            use_case = describe_use_case(use_case),
        )
    }
}

#[async_trait]
impl Stage for ImplementationPlanStage {
    fn kind(&self) -> StageKind {
        StageKind::ImplementationPlan
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let use_cases = prior.fragments.use_cases();
        if use_cases.is_empty() {
            return Err(StageFailure::MissingInput("no use cases to plan".to_string()));
        }

        let mut plans = Vec::with_capacity(use_cases.len());
        let mut first_error: Option<ProviderError> = None;

        for use_case in use_cases {
            let answer = match self
                .llm
                .complete(None, &Self::prompt(use_case, &subject.industry))
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("Planning '{}' failed: {}", use_case.title, e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            match extract_json_object(&answer) {
                Some(plan) => plans.push(PlannedUseCase {
                    use_case: use_case.title.clone(),
                    plan,
                }),
                None => warn!("No plan JSON in model answer for '{}'", use_case.title),
            }
        }

        if plans.is_empty() {
            return Err(match first_error {
                Some(e) => e.into(),
                None => StageFailure::Malformed("no implementation plan JSON in model output".to_string()),
            });
        }

        debug!(
            "Planned {} of {} use cases for {}",
            plans.len(),
            use_cases.len(),
            subject
        );
        Ok(StageOutput::new(StageResult::ImplementationPlan(plans)))
    }
}
