//! Competitor identification and competitive positioning.

use super::parse::{extract_json_array, extract_json_object, string_list, web_context};
use super::{citations_of, search_or_empty};
use crate::error::StageFailure;
use crate::models::{Competitor, CompetitorAnalysis, Report, StageKind, StageResult, Subject};
use crate::pipeline::{Stage, StageOutput};
use crate::provider::{LlmProvider, SearchProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const POSITIONING_RESULTS: usize = 3;

pub struct CompetitorStage {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl CompetitorStage {
    pub fn new(llm: Arc<dyn LlmProvider>, search: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            llm,
            search,
            max_results,
        }
    }

    fn identify_prompt(subject: &Subject, context: &str) -> String {
        format!(
            "Based on the following information about {company} in the {industry} industry, \
identify their top 3-5 direct competitors.

Information:
{context}

For each competitor provide the company name, a one or two sentence description, \
and the AI/ML initiatives they are known for (if any).

Answer with JSON only, no explanations and no code fences:
[
    {{
        \"name\": \"Competitor Name\",
        \"description\": \"Brief description\",
        \"ai_initiatives\": [\"Initiative 1\", \"Initiative 2\"]
    }}
]

Focus on direct competitors with similar offerings or target markets.",
            company = subject.company,
            industry = subject.industry,
            context = context,
        )
    }

    fn positioning_prompt(
        subject: &Subject,
        competitors: &[Competitor],
        offerings: &[String],
        context: &str,
    ) -> String {
        let roster = competitors
            .iter()
            .map(|c| {
                format!(
                    "- {}: {}\n  AI Initiatives: {}",
                    c.name,
                    c.description,
                    c.ai_initiatives.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Analyze the competitive positioning of {company} in the {industry} industry \
compared to these competitors:

{roster}

{company}'s key offerings: {offerings}

Additional context:
{context}

Answer with JSON only, no code fences:
{{
    \"strengths\": [\"Strength 1\", \"Strength 2\"],
    \"weaknesses\": [\"Weakness 1\", \"Weakness 2\"],
    \"opportunities\": [\"Opportunity 1\", \"Opportunity 2\"],
    \"threats\": [\"Threat 1\", \"Threat 2\"],
    \"ai_maturity_score\": 0-10,
    \"ai_maturity_explanation\": \"Brief explanation of the AI maturity score\",
    \"competitive_positioning\": \"Summary of competitive positioning (3-4 sentences)\"
}}",
            company = subject.company,
            industry = subject.industry,
            roster = roster,
            offerings = offerings.join(", "),
            context = context,
        )
    }
}

fn json_to_competitor(json: &Value) -> Option<Competitor> {
    Some(Competitor {
        name: json["name"].as_str()?.trim().to_string(),
        description: json["description"].as_str().unwrap_or("").to_string(),
        ai_initiatives: string_list(&json["ai_initiatives"]),
    })
}

#[async_trait]
impl Stage for CompetitorStage {
    fn kind(&self) -> StageKind {
        StageKind::Competitors
    }

    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure> {
        let competitor_hits = search_or_empty(
            self.search.as_ref(),
            &format!(
                "top competitors of {} in {} industry",
                subject.company, subject.industry
            ),
            self.max_results,
        )
        .await;

        let answer = self
            .llm
            .complete(
                None,
                &Self::identify_prompt(subject, &web_context(&competitor_hits, false, None)),
            )
            .await?;

        let competitors: Vec<Competitor> = match extract_json_array(&answer) {
            Some(Value::Array(items)) => items.iter().filter_map(json_to_competitor).collect(),
            _ => {
                warn!("No competitor list in model answer for {}", subject);
                Vec::new()
            }
        };
        debug!("Identified {} competitors for {}", competitors.len(), subject);

        let positioning_hits = search_or_empty(
            self.search.as_ref(),
            &format!(
                "{} competitive advantage AI ML {} compared to competitors",
                subject.company, subject.industry
            ),
            POSITIONING_RESULTS,
        )
        .await;

        let answer = self
            .llm
            .complete(
                None,
                &Self::positioning_prompt(
                    subject,
                    &competitors,
                    prior.fragments.key_offerings(),
                    &web_context(&positioning_hits, false, None),
                ),
            )
            .await?;

        let positioning = extract_json_object(&answer).unwrap_or(Value::Null);
        if competitors.is_empty() && positioning.is_null() {
            return Err(StageFailure::Malformed(
                "no competitor list or positioning JSON in model output".to_string(),
            ));
        }

        let mut citations = citations_of(&competitor_hits);
        citations.extend(citations_of(&positioning_hits));

        Ok(StageOutput::new(StageResult::Competitors(CompetitorAnalysis {
            competitors,
            positioning,
        }))
        .with_citations(citations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{web_hit, ScriptedLlm, StaticSearch};
    use chrono::Utc;

    const COMPETITORS: &str = r#"Here is the list:
[
  {"name": "Globex", "description": "Discount chain", "ai_initiatives": ["Cashierless stores"]},
  {"description": "nameless entry"},
  {"name": "Initech"}
]"#;

    const POSITIONING: &str =
        r#"{"strengths": ["Brand"], "ai_maturity_score": 6, "competitive_positioning": "Solid"}"#;

    fn empty_report(subject: &Subject) -> Report {
        Report::pending(subject.clone(), &StageKind::ALL, Utc::now())
    }

    #[tokio::test]
    async fn test_parses_competitors_and_positioning() {
        let llm = Arc::new(
            ScriptedLlm::new(POSITIONING).rule("identify their top 3-5 direct competitors", COMPETITORS),
        );
        let search = Arc::new(StaticSearch::new(vec![
            web_hit("Rivals", "https://news/rivals", 0.8),
        ]));
        let stage = CompetitorStage::new(llm.clone(), search.clone(), 5);
        let subject = Subject::new("Acme Corp", "Retail");

        let output = stage.run(&subject, &empty_report(&subject)).await.unwrap();

        let StageResult::Competitors(analysis) = output.result else {
            panic!("unexpected fragment kind");
        };
        let names: Vec<_> = analysis.competitors.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Globex", "Initech"]);
        assert_eq!(analysis.competitors[0].ai_initiatives, vec!["Cashierless stores"]);
        assert_eq!(analysis.positioning["ai_maturity_score"], 6);
        assert_eq!(output.citations.len(), 2);
        assert_eq!(search.calls(), 2);

        assert!(llm.prompts()[1].contains("- Globex: Discount chain"));
    }

    #[tokio::test]
    async fn test_unparseable_answers_are_malformed() {
        let llm = Arc::new(ScriptedLlm::new("I cannot answer that."));
        let stage = CompetitorStage::new(llm, Arc::new(StaticSearch::new(vec![])), 5);
        let subject = Subject::new("Acme Corp", "Retail");

        let err = stage.run(&subject, &empty_report(&subject)).await.unwrap_err();
        assert!(matches!(err, StageFailure::Malformed(_)));
    }
}
