//! Folding stage outcomes into a report.
//!
//! Each fragment lands in the report field owned by its stage kind; a second
//! fragment for the same field replaces the first. Citations are appended,
//! de-duplicated by URL.

use crate::error::StageFailure;
use crate::models::{Report, StageKind, StageResult, StageStatus};
use crate::pipeline::StageOutput;
use std::time::Duration;
use tracing::{debug, warn};

/// Record one stage outcome in the report and return the resulting status.
pub fn fold(
    report: &mut Report,
    kind: StageKind,
    outcome: Result<StageOutput, StageFailure>,
    elapsed: Duration,
) -> StageStatus {
    let merged = outcome.and_then(|output| merge(report, kind, output));

    let (status, error) = match merged {
        Ok(()) => (StageStatus::Success, None),
        Err(failure) if failure.is_skip() => {
            debug!("Stage {} skipped for {}: {}", kind, report.subject, failure);
            (StageStatus::Skipped, Some(failure.to_string()))
        }
        Err(failure) => {
            warn!("Stage {} failed for {}: {}", kind, report.subject, failure);
            (StageStatus::Failed, Some(failure.to_string()))
        }
    };

    match report.stages.iter_mut().find(|r| r.stage == kind) {
        Some(record) => {
            record.status = status;
            record.error = error;
            record.duration_ms = elapsed.as_millis() as u64;
        }
        None => warn!("Stage {} is not part of the report for {}", kind, report.subject),
    }

    status
}

/// Merge a stage's fragment and citations into the report.
///
/// A fragment whose kind differs from the producing stage's kind is rejected
/// as malformed and leaves the report untouched.
pub fn merge(report: &mut Report, kind: StageKind, output: StageOutput) -> Result<(), StageFailure> {
    let produced = output.result.kind();
    if produced != kind {
        return Err(StageFailure::Malformed(format!(
            "stage {} produced a {} fragment",
            kind, produced
        )));
    }

    let fragments = &mut report.fragments;
    match output.result {
        StageResult::IndustryResearch(v) => fragments.industry_research = Some(v),
        StageResult::UseCases(v) => fragments.use_cases = Some(v),
        StageResult::AiRecommendations(v) => fragments.ai_recommendations = Some(v),
        StageResult::Resources(v) => fragments.resources = Some(v),
        StageResult::Competitors(v) => fragments.competitors = Some(v),
        StageResult::ImplementationPlan(v) => fragments.implementation_plan = Some(v),
        StageResult::CostBenefit(v) => fragments.cost_benefit = Some(v),
    }

    for citation in output.citations {
        if citation.url.is_empty() {
            continue;
        }
        if !report.citations.iter().any(|c| c.url == citation.url) {
            report.citations.push(citation);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Citation, Subject};
    use chrono::Utc;

    fn empty_report() -> Report {
        Report::pending(
            Subject::new("Acme Corp", "Retail"),
            &StageKind::ALL,
            Utc::now(),
        )
    }

    fn cite(url: &str) -> Citation {
        Citation {
            title: url.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_fold_success_sets_fragment_and_status() {
        let mut report = empty_report();
        let output = StageOutput::new(StageResult::AiRecommendations("Use RAG".to_string()));

        let status = fold(
            &mut report,
            StageKind::AiRecommendations,
            Ok(output),
            Duration::from_millis(42),
        );

        assert_eq!(status, StageStatus::Success);
        assert_eq!(
            report.fragments.ai_recommendations.as_deref(),
            Some("Use RAG")
        );
        let record = &report.stages[2];
        assert_eq!(record.stage, StageKind::AiRecommendations);
        assert_eq!(record.duration_ms, 42);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_fold_failure_keeps_prior_fragments() {
        let mut report = empty_report();
        report.fragments.resources = Some(vec!["https://github.com/x".to_string()]);

        let status = fold(
            &mut report,
            StageKind::Resources,
            Err(StageFailure::Network("offline".to_string())),
            Duration::ZERO,
        );

        assert_eq!(status, StageStatus::Failed);
        assert_eq!(report.fragments.resources.as_ref().map(|r| r.len()), Some(1));
        assert_eq!(
            report.stages[3].error.as_deref(),
            Some("network error: offline")
        );
    }

    #[test]
    fn test_fold_missing_input_is_skipped() {
        let mut report = empty_report();
        let status = fold(
            &mut report,
            StageKind::CostBenefit,
            Err(StageFailure::MissingInput("no plans".to_string())),
            Duration::ZERO,
        );
        assert_eq!(status, StageStatus::Skipped);
        assert_eq!(
            report.status_of(StageKind::CostBenefit),
            Some(StageStatus::Skipped)
        );
    }

    #[test]
    fn test_merge_rejects_wrong_fragment_kind() {
        let mut report = empty_report();
        let output = StageOutput::new(StageResult::Resources(vec!["https://a".to_string()]));

        let status = fold(&mut report, StageKind::UseCases, Ok(output), Duration::ZERO);

        assert_eq!(status, StageStatus::Failed);
        assert!(report.fragments.resources.is_none());
        assert!(report.fragments.use_cases.is_none());
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut report = empty_report();
        merge(
            &mut report,
            StageKind::AiRecommendations,
            StageOutput::new(StageResult::AiRecommendations("first".to_string())),
        )
        .unwrap();
        merge(
            &mut report,
            StageKind::AiRecommendations,
            StageOutput::new(StageResult::AiRecommendations("second".to_string())),
        )
        .unwrap();

        assert_eq!(
            report.fragments.ai_recommendations.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_merge_deduplicates_citations() {
        let mut report = empty_report();
        let output = StageOutput::new(StageResult::Resources(vec![])).with_citations(vec![
            cite("https://a"),
            cite("https://b"),
            cite("https://a"),
            cite(""),
        ]);
        merge(&mut report, StageKind::Resources, output).unwrap();

        let again = StageOutput::new(StageResult::Resources(vec![]))
            .with_citations(vec![cite("https://b"), cite("https://c")]);
        merge(&mut report, StageKind::Resources, again).unwrap();

        let urls: Vec<_> = report.citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }
}
