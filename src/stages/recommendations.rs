//! Strategic AI technology recommendations, returned as Markdown.

use crate::error::StageFailure;
use crate::models::{Report, StageKind, StageResult, Subject};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an AI strategy consultant who helps businesses identify the \
AI technologies that will benefit them most. You understand the current AI landscape across \
industries, can match business requirements to AI capabilities, and know the implementation \
challenges, costs, and ROI considerations involved.

When recommending AI tools:
- Prioritize solutions for critical business needs over trends without clear applications
- Consider the company's scale, technical capabilities, and industry context
- Name specific products or model types, not just categories
- Explain concrete benefits and use cases for each recommendation
- Call out implementation challenges and resource requirements
- Mix established solutions with emerging technologies where appropriate

Keep recommendations actionable, practical, and tailored to the business context.";

pub struct AiRecommendationStage {
    llm: Arc<dyn LlmProvider>,
}

impl AiRecommendationStage {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for AiRecommendationStage {
    fn kind(&self) -> StageKind {
        StageKind::AiRecommendations
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let prompt = format!(
            "Evaluate {company}'s potential for AI integration based on the following information.

### Company Information
- Company Name: {company}
- Industry: {industry}

### Business Profile
- Key Offerings: {offerings}

### Market Context
- Industry Trends: {trends}

## Deliverable
Provide a strategic AI adoption plan with the top 5 recommended AI technologies. For each one include:
   - Specific technology or model name
   - Primary business application
   - Expected benefits (quantitative where possible)
   - Implementation complexity (Low/Medium/High)
   - Estimated implementation timeline
   - Potential ROI indicators

Answer in structured Markdown with bullet points. Be concise and avoid generic advice; \
focus on technologies that fit the company's needs and its industry trends.",
            company = subject.company,
            industry = subject.industry,
            offerings = prior.fragments.key_offerings().join(", "),
            trends = prior.fragments.market_trends().join(", "),
        );

        let answer = self.llm.complete(Some(SYSTEM_PROMPT), &prompt).await?;

        Ok(StageOutput::new(StageResult::AiRecommendations(
            answer.trim().to_string(),
        )))
    }
}
