//! Markdown report generation.
//!
//! This module generates a combined Markdown research report for every
//! company of a batch, plus a JSON export of the same data.

use crate::batch::{BatchRun, SubjectOutcome};
use crate::models::{
    Citation, CompetitorAnalysis, CostBenefit, IndustryResearch, PlannedUseCase, Provenance,
    StageRecord, StageStatus, UseCase,
};
use anyhow::Result;
use serde_json::Value;

/// Generate a complete Markdown report for a batch.
pub fn generate_markdown_report(run: &BatchRun) -> String {
    let mut output = String::new();

    output.push_str("# MarketScout Report\n\n");
    output.push_str(&generate_summary_section(run));
    output.push_str(&generate_table_of_contents(run));

    for outcome in &run.outcomes {
        output.push_str(&generate_company_section(outcome));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(run: &BatchRun) -> Result<String> {
    serde_json::to_string_pretty(run).map_err(Into::into)
}

fn anchor(company: &str) -> String {
    company
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Batch metadata and one row per company.
fn generate_summary_section(run: &BatchRun) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!("- **Industry:** {}\n", run.industry));
    section.push_str(&format!(
        "- **Companies:** {} of {} reported\n",
        run.outcomes.len(),
        run.requested
    ));
    section.push_str(&format!("- **Served from cache:** {}\n", run.cached_count()));
    section.push_str(&format!("- **Batch status:** {}\n", run.status));
    if run.degraded_count() > 0 {
        section.push_str(&format!(
            "- **Reports with failed or skipped stages:** {}\n",
            run.degraded_count()
        ));
    }
    section.push('\n');

    if run.outcomes.is_empty() {
        section.push_str("No reports were produced.\n\n");
        return section;
    }

    section.push_str("| Company | Source | ✅ Stages | ❌ Failed | ⏭️ Skipped | Generated |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---|\n");
    for outcome in &run.outcomes {
        let report = &outcome.report;
        section.push_str(&format!(
            "| {} | {} | {}/{} | {} | {} | {} |\n",
            report.subject.company,
            outcome.provenance,
            report.count_with_status(StageStatus::Success),
            report.stages.len(),
            report.count_with_status(StageStatus::Failed),
            report.count_with_status(StageStatus::Skipped),
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    section.push('\n');

    section
}

fn generate_table_of_contents(run: &BatchRun) -> String {
    if run.outcomes.is_empty() {
        return String::new();
    }

    let mut toc = String::new();
    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Summary](#summary)\n");
    for outcome in &run.outcomes {
        let company = &outcome.report.subject.company;
        toc.push_str(&format!("- [{}](#{})\n", company, anchor(company)));
    }
    toc.push('\n');
    toc
}

/// Generate every section for one company.
fn generate_company_section(outcome: &SubjectOutcome) -> String {
    let report = &outcome.report;
    let fragments = &report.fragments;
    let mut section = String::new();

    section.push_str(&format!(
        "## {} {{#{}}}\n\n",
        report.subject.company,
        anchor(&report.subject.company)
    ));
    let source = match outcome.provenance {
        Provenance::Cached => "cached",
        Provenance::Fresh => "fresh",
    };
    section.push_str(&format!(
        "*Industry: {} | Generated: {} | Source: {}*\n\n",
        report.subject.industry,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        source
    ));

    section.push_str(&generate_stage_table(&report.stages));

    if let Some(ref research) = fragments.industry_research {
        section.push_str(&generate_industry_section(research));
    }
    if let Some(ref use_cases) = fragments.use_cases {
        section.push_str(&generate_use_cases_section(use_cases));
    }
    if let Some(ref recommendations) = fragments.ai_recommendations {
        section.push_str("### 💡 AI Recommendations\n\n");
        section.push_str(recommendations.trim());
        section.push_str("\n\n");
    }
    if let Some(ref resources) = fragments.resources {
        section.push_str(&generate_resources_section(resources));
    }
    if let Some(ref competitors) = fragments.competitors {
        section.push_str(&generate_competitors_section(competitors));
    }
    if let Some(ref plans) = fragments.implementation_plan {
        section.push_str(&generate_plans_section(plans));
    }
    if let Some(ref analyses) = fragments.cost_benefit {
        section.push_str(&generate_cost_benefit_section(analyses));
    }

    section.push_str(&generate_sources_section(&report.citations));
    section.push_str("---\n\n");

    section
}

/// Stage status table, one row per registered stage.
fn generate_stage_table(stages: &[StageRecord]) -> String {
    let mut table = String::new();

    table.push_str("| Stage | Status | Duration | Note |\n");
    table.push_str("|:---|:---:|:---:|:---|\n");
    for record in stages {
        table.push_str(&format!(
            "| {} {} | {} {} | {:.1}s | {} |\n",
            record.stage.emoji(),
            record.stage.label(),
            record.status.emoji(),
            record.status,
            record.duration_ms as f64 / 1000.0,
            record.error.as_deref().unwrap_or(""),
        ));
    }
    table.push('\n');

    table
}

fn generate_industry_section(research: &IndustryResearch) -> String {
    let mut section = String::new();

    section.push_str("### 🏭 Industry Research\n\n");

    if !research.key_offerings.is_empty() {
        section.push_str("**Key offerings:** ");
        section.push_str(&research.key_offerings.join(", "));
        section.push_str("\n\n");
    }

    if !research.market_trends.is_empty() {
        section.push_str("**Market trends:**\n\n");
        for trend in &research.market_trends {
            section.push_str(&format!("- {}\n", trend));
        }
        section.push('\n');
    }

    if !research.insights.trim().is_empty() {
        section.push_str(research.insights.trim());
        section.push_str("\n\n");
    }

    section
}

fn generate_use_cases_section(use_cases: &[UseCase]) -> String {
    let mut section = String::new();

    section.push_str("### 🎯 AI Use Cases\n\n");
    if use_cases.is_empty() {
        section.push_str("No use cases were identified.\n\n");
        return section;
    }

    for (i, use_case) in use_cases.iter().enumerate() {
        section.push_str(&format!("#### {}. {}\n\n", i + 1, use_case.title));
        if !use_case.objective.is_empty() {
            section.push_str(&format!("**Objective:** {}\n\n", use_case.objective));
        }
        if !use_case.ai_application.is_empty() {
            section.push_str(&format!("**AI application:** {}\n\n", use_case.ai_application));
        }
        if !use_case.cross_functional_benefits.is_empty() {
            section.push_str("**Cross-functional benefits:**\n\n");
            for benefit in &use_case.cross_functional_benefits {
                section.push_str(&format!("- {}\n", benefit));
            }
            section.push('\n');
        }
        if !use_case.articles.is_empty() {
            section.push_str("**Further reading:**\n\n");
            for url in &use_case.articles {
                section.push_str(&format!("- <{}>\n", url));
            }
            section.push('\n');
        }
    }

    section
}

fn generate_resources_section(resources: &[String]) -> String {
    let mut section = String::new();

    section.push_str("### 📚 Resources\n\n");
    if resources.is_empty() {
        section.push_str("No resources were found.\n\n");
        return section;
    }
    for url in resources {
        section.push_str(&format!("- <{}>\n", url));
    }
    section.push('\n');

    section
}

fn generate_competitors_section(analysis: &CompetitorAnalysis) -> String {
    let mut section = String::new();

    section.push_str("### 🏁 Competitor Analysis\n\n");

    for competitor in &analysis.competitors {
        section.push_str(&format!("#### {}\n\n", competitor.name));
        if !competitor.description.is_empty() {
            section.push_str(&competitor.description);
            section.push_str("\n\n");
        }
        for initiative in &competitor.ai_initiatives {
            section.push_str(&format!("- {}\n", initiative));
        }
        if !competitor.ai_initiatives.is_empty() {
            section.push('\n');
        }
    }

    let positioning = &analysis.positioning;
    if let Some(summary) = positioning["competitive_positioning"].as_str() {
        section.push_str(&format!("**Positioning:** {}\n\n", summary));
    }
    if let Some(score) = positioning["ai_maturity_score"].as_f64() {
        section.push_str(&format!("**AI maturity:** {}/10", score));
        if let Some(explanation) = positioning["ai_maturity_explanation"].as_str() {
            section.push_str(&format!(" - {}", explanation));
        }
        section.push_str("\n\n");
    }
    for (heading, key) in [
        ("Strengths", "strengths"),
        ("Weaknesses", "weaknesses"),
        ("Opportunities", "opportunities"),
        ("Threats", "threats"),
    ] {
        push_list(&mut section, heading, &string_items(&positioning[key]));
    }

    section
}

fn generate_plans_section(plans: &[PlannedUseCase]) -> String {
    let mut section = String::new();

    section.push_str("### 🗺️ Implementation Plans\n\n");

    for planned in plans {
        let plan = &planned.plan;
        section.push_str(&format!("#### {}\n\n", planned.use_case));
        if let Some(timeline) = plan["estimated_timeline"].as_str() {
            section.push_str(&format!("**Estimated timeline:** {}\n\n", timeline));
        }

        if let Some(phases) = plan["phases"].as_array() {
            if !phases.is_empty() {
                section.push_str("| Phase | Duration | Deliverables |\n");
                section.push_str("|:---|:---:|:---|\n");
                for phase in phases {
                    section.push_str(&format!(
                        "| {} | {} | {} |\n",
                        phase["name"].as_str().unwrap_or("Unnamed phase"),
                        phase["duration"].as_str().unwrap_or("-"),
                        string_items(&phase["deliverables"]).join("; "),
                    ));
                }
                section.push('\n');
            }
        }

        push_list(&mut section, "Key dependencies", &string_items(&plan["key_dependencies"]));
        push_list(
            &mut section,
            "Implementation challenges",
            &string_items(&plan["implementation_challenges"]),
        );
        push_list(&mut section, "Success criteria", &string_items(&plan["success_criteria"]));
    }

    section
}

fn generate_cost_benefit_section(analyses: &[CostBenefit]) -> String {
    let mut section = String::new();

    section.push_str("### 💰 Cost-Benefit Analysis\n\n");

    for entry in analyses {
        let analysis = &entry.analysis;
        let costs = &analysis["implementation_costs"];
        let roi = &analysis["roi_analysis"];

        section.push_str(&format!("#### {}\n\n", entry.use_case));
        section.push_str("| Metric | Estimate |\n");
        section.push_str("|:---|:---|\n");
        for (label, value) in [
            ("Total cost", &costs["total_cost_range"]),
            ("Technology", &costs["technology"]["total_tech_costs"]),
            ("People", &costs["human_resources"]["total_hr_costs"]),
            ("Payback period", &roi["payback_period"]),
            ("First-year ROI", &roi["first_year_roi"]),
            ("Three-year ROI", &roi["three_year_roi"]),
        ] {
            if let Some(text) = value.as_str() {
                section.push_str(&format!("| {} | {} |\n", label, text));
            }
        }
        section.push('\n');

        if let Some(benefits) = analysis["expected_benefits"]["quantitative"].as_array() {
            let lines: Vec<String> = benefits
                .iter()
                .filter_map(|b| {
                    let benefit = b["benefit"].as_str()?;
                    Some(format!(
                        "{} ({}, {})",
                        benefit,
                        b["estimated_value"].as_str().unwrap_or("value unknown"),
                        b["timeframe"].as_str().unwrap_or("timeframe unknown"),
                    ))
                })
                .collect();
            push_list(&mut section, "Expected benefits", &lines);
        }
        push_list(
            &mut section,
            "Qualitative benefits",
            &string_items(&analysis["expected_benefits"]["qualitative"]),
        );
        push_list(&mut section, "Risk factors", &string_items(&analysis["risk_factors"]));
    }

    section
}

fn generate_sources_section(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("### 🔗 Sources\n\n");
    for (i, citation) in citations.iter().enumerate() {
        let title = if citation.title.trim().is_empty() {
            citation.url.as_str()
        } else {
            citation.title.trim()
        };
        section.push_str(&format!("{}. [{}]({})\n", i + 1, title, citation.url));
    }
    section.push('\n');
    section
}

/// Strings of a JSON array; anything else yields nothing.
fn string_items(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn push_list(section: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    section.push_str(&format!("**{}:**\n\n", heading));
    for item in items {
        section.push_str(&format!("- {}\n", item));
    }
    section.push('\n');
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "*Report generated by MarketScout v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, Competitor, Report, StageKind, Subject};
    use chrono::Utc;
    use serde_json::json;

    fn create_test_report() -> Report {
        let mut report = Report::pending(
            Subject::new("Acme Corp", "Retail"),
            &StageKind::ALL,
            Utc::now(),
        );
        for record in &mut report.stages {
            record.status = StageStatus::Success;
        }
        report.stages[5].status = StageStatus::Failed;
        report.stages[5].error = Some("timed out after 600s".to_string());
        report.stages[6].status = StageStatus::Skipped;

        report.fragments.industry_research = Some(IndustryResearch {
            key_offerings: vec!["Groceries".to_string(), "Apparel".to_string()],
            market_trends: vec!["Omnichannel fulfilment keeps growing".to_string()],
            insights: "Margins are thin.".to_string(),
            web_results: vec![],
        });
        report.fragments.use_cases = Some(vec![UseCase {
            title: "Demand Forecasting".to_string(),
            objective: "Cut stockouts".to_string(),
            ai_application: "Gradient boosted models".to_string(),
            cross_functional_benefits: vec!["Supply chain: fewer rush orders".to_string()],
            articles: vec!["https://example.com/forecasting".to_string()],
        }]);
        report.fragments.ai_recommendations = Some("1. Start with forecasting.".to_string());
        report.fragments.competitors = Some(CompetitorAnalysis {
            competitors: vec![Competitor {
                name: "Globex".to_string(),
                description: "Discount chain".to_string(),
                ai_initiatives: vec!["Cashierless checkout".to_string()],
            }],
            positioning: json!({"weaknesses": ["No loyalty analytics"], "ai_maturity_score": 6}),
        });
        report.citations = vec![Citation {
            title: "Retail AI trends".to_string(),
            url: "https://example.com/trends".to_string(),
        }];
        report
    }

    fn create_test_run() -> BatchRun {
        let report = create_test_report();
        let mut cached = report.clone();
        cached.subject = Subject::new("Initech", "Retail");
        BatchRun {
            status: BatchStatus::Completed,
            industry: "Retail".to_string(),
            outcomes: vec![
                SubjectOutcome {
                    report,
                    provenance: Provenance::Fresh,
                },
                SubjectOutcome {
                    report: cached,
                    provenance: Provenance::Cached,
                },
            ],
            requested: 2,
            cursor: 1,
            stage_invocations: 7,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_run());

        assert!(markdown.contains("# MarketScout Report"));
        assert!(markdown.contains("- **Industry:** Retail"));
        assert!(markdown.contains("- **Served from cache:** 1"));
        assert!(markdown.contains("## Acme Corp {#acme-corp}"));
        assert!(markdown.contains("- [Initech](#initech)"));
        assert!(markdown.contains("Demand Forecasting"));
        assert!(markdown.contains("Omnichannel fulfilment keeps growing"));
        assert!(markdown.contains("#### Globex"));
        assert!(markdown.contains("- No loyalty analytics"));
        assert!(markdown.contains("**AI maturity:** 6/10"));
        assert!(markdown.contains("1. [Retail AI trends](https://example.com/trends)"));
    }

    #[test]
    fn test_companies_keep_batch_order() {
        let markdown = generate_markdown_report(&create_test_run());
        let acme = markdown.find("## Acme Corp").unwrap();
        let initech = markdown.find("## Initech").unwrap();
        assert!(acme < initech);
    }

    #[test]
    fn test_stage_table_shows_failures() {
        let table = generate_stage_table(&create_test_report().stages);

        assert_eq!(table.lines().count(), 2 + StageKind::ALL.len() + 1);
        assert!(table.contains("timed out after 600s"));
        assert!(table.contains(StageStatus::Skipped.emoji()));
    }

    #[test]
    fn test_plan_and_cost_sections() {
        let plans = vec![PlannedUseCase {
            use_case: "Demand Forecasting".to_string(),
            plan: json!({
                "estimated_timeline": "9-12 months",
                "phases": [{"name": "Planning", "duration": "2 months", "deliverables": ["Charter"]}],
                "success_criteria": ["MAPE below 15%"]
            }),
        }];
        let section = generate_plans_section(&plans);
        assert!(section.contains("**Estimated timeline:** 9-12 months"));
        assert!(section.contains("| Planning | 2 months | Charter |"));
        assert!(section.contains("- MAPE below 15%"));

        let analyses = vec![CostBenefit {
            use_case: "Demand Forecasting".to_string(),
            analysis: json!({
                "implementation_costs": {"total_cost_range": "$200k-$350k"},
                "roi_analysis": {"payback_period": "14 months"},
                "expected_benefits": {"quantitative": [{"benefit": "Lower inventory"}]}
            }),
        }];
        let section = generate_cost_benefit_section(&analyses);
        assert!(section.contains("| Total cost | $200k-$350k |"));
        assert!(section.contains("| Payback period | 14 months |"));
        assert!(section.contains("Lower inventory (value unknown, timeframe unknown)"));
    }

    #[test]
    fn test_empty_batch() {
        let run = BatchRun {
            status: BatchStatus::Aborted,
            industry: "Retail".to_string(),
            outcomes: vec![],
            requested: 3,
            cursor: 0,
            stage_invocations: 0,
        };
        let markdown = generate_markdown_report(&run);
        assert!(markdown.contains("No reports were produced."));
        assert!(markdown.contains("- **Batch status:** aborted"));
        assert!(!markdown.contains("## Table of Contents"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_run()).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["status"], "completed");
        assert_eq!(parsed["outcomes"][1]["provenance"], "cached");
        assert_eq!(
            parsed["outcomes"][0]["report"]["subject"]["company"],
            "Acme Corp"
        );
    }
}
