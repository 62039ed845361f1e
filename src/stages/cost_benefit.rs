//! Cost-benefit estimates for each planned use case.

use super::parse::{describe_use_case, extract_json_object};
use crate::error::{ProviderError, StageFailure};
use crate::models::{CostBenefit, PlannedUseCase, Report, StageKind, StageResult, Subject, UseCase};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const ANALYSIS_SCHEMA: &str = r#"{
    "implementation_costs": {
        "technology": {
            "hardware": "Estimated cost range",
            "software": "Estimated cost range",
            "infrastructure": "Estimated cost range",
            "total_tech_costs": "Estimated total technology costs"
        },
        "human_resources": {
            "internal_team": "Estimated cost range",
            "contractors": "Estimated cost range",
            "training": "Estimated cost range",
            "total_hr_costs": "Estimated total HR costs"
        },
        "other_costs": ["Other cost 1", "Other cost 2"],
        "total_cost_range": "Estimated total cost range"
    },
    "expected_benefits": {
        "quantitative": [
            {
                "benefit": "Benefit description",
                "estimated_value": "Estimated value range",
                "timeframe": "Expected timeframe"
            }
        ],
        "qualitative": ["Qualitative benefit 1", "Qualitative benefit 2"]
    },
    "roi_analysis": {
        "payback_period": "Estimated payback period",
        "first_year_roi": "Estimated first year ROI percentage",
        "three_year_roi": "Estimated three year ROI percentage",
        "non_financial_benefits": ["Benefit 1", "Benefit 2"]
    },
    "risk_factors": ["Risk 1", "Risk 2"]
}"#;

pub struct CostBenefitStage {
    llm: Arc<dyn LlmProvider>,
}

impl CostBenefitStage {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn prompt(plan: &PlannedUseCase, use_case: Option<&UseCase>, industry: &str) -> String {
        let mut context = match use_case {
            Some(uc) => describe_use_case(uc),
            None => format!("Use Case: {}", plan.use_case),
        };
        if let Some(timeline) = plan.plan["estimated_timeline"].as_str() {
            context.push_str(&format!("\nPlanned Timeline: {}", timeline));
        }

        format!(
            "Provide a detailed cost-benefit analysis for implementing the following AI use case \
in the {industry} industry:

{context}

Answer with JSON only, no explanations and no code fences:
{schema}

Use realistic industry-standard cost ranges and ROI estimates based on similar AI implementations.",
            industry = industry,
            context = context,
            schema = ANALYSIS_SCHEMA,
        )
    }
}

#[async_trait]
impl Stage for CostBenefitStage {
    fn kind(&self) -> StageKind {
        StageKind::CostBenefit
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let plans = prior
            .fragments
            .implementation_plan
            .as_deref()
            .unwrap_or(&[]);
        if plans.is_empty() {
            return Err(StageFailure::MissingInput(
                "no implementation plans to evaluate".to_string(),
            ));
        }

        let use_cases = prior.fragments.use_cases();
        let mut analyses = Vec::with_capacity(plans.len());
        let mut first_error: Option<ProviderError> = None;

        for plan in plans {
            let use_case = use_cases.iter().find(|uc| uc.title == plan.use_case);
            let answer = match self
                .llm
                .complete(None, &Self::prompt(plan, use_case, &subject.industry))
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("Cost-benefit for '{}' failed: {}", plan.use_case, e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            match extract_json_object(&answer) {
                Some(analysis) => analyses.push(CostBenefit {
                    use_case: plan.use_case.clone(),
                    analysis,
                }),
                None => warn!("No cost-benefit JSON in model answer for '{}'", plan.use_case),
            }
        }

        if analyses.is_empty() {
            return Err(match first_error {
                Some(e) => e.into(),
                None => StageFailure::Malformed("no cost-benefit JSON in model output".to_string()),
            });
        }

        debug!("Estimated {} cost-benefit analyses for {}", analyses.len(), subject);
        Ok(StageOutput::new(StageResult::CostBenefit(analyses)))
    }
}
