//! Data models for the research pipeline.
//!
//! This module contains the core data structures shared by the stages,
//! the pipeline executor, the cache store, and the report exporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A company being researched within an industry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Company name as entered by the user.
    pub company: String,
    /// Industry label shared by every subject of a batch.
    pub industry: String,
}

impl Subject {
    pub fn new(company: impl Into<String>, industry: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            industry: industry.into(),
        }
    }

    /// Cache key for this subject.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.company, &self.industry)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.company, self.industry)
    }
}

/// Deterministic cache key derived from a normalized (company, industry) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build the fingerprint for a company and industry.
    ///
    /// Both parts are trimmed, whitespace runs collapse to a single space,
    /// and the text is lowercased, so `"  ACME   corp "` and `"Acme Corp"`
    /// share an entry.
    pub fn of(company: &str, industry: &str) -> Self {
        Self(format!("{}::{}", normalize(company), normalize(industry)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe name for this fingerprint.
    ///
    /// Every byte outside `[a-z0-9]` is written as `_xx` hex, which keeps the
    /// mapping injective (the underscore itself is escaped).
    pub fn file_stem(&self) -> String {
        let mut stem = String::with_capacity(self.0.len() * 2);
        for byte in self.0.bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("_{:02x}", byte));
            }
        }
        stem
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of a research stage, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    IndustryResearch,
    UseCases,
    AiRecommendations,
    Resources,
    Competitors,
    ImplementationPlan,
    CostBenefit,
}

impl StageKind {
    /// Every stage of the standard pipeline, in execution order.
    pub const ALL: [StageKind; 7] = [
        StageKind::IndustryResearch,
        StageKind::UseCases,
        StageKind::AiRecommendations,
        StageKind::Resources,
        StageKind::Competitors,
        StageKind::ImplementationPlan,
        StageKind::CostBenefit,
    ];

    /// Stable machine name, used as the key in exported reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::IndustryResearch => "industry_research",
            StageKind::UseCases => "use_cases",
            StageKind::AiRecommendations => "ai_recommendations",
            StageKind::Resources => "resources",
            StageKind::Competitors => "competitors",
            StageKind::ImplementationPlan => "implementation_plan",
            StageKind::CostBenefit => "cost_benefit",
        }
    }

    /// Human readable title.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::IndustryResearch => "Industry Research",
            StageKind::UseCases => "AI Use Cases",
            StageKind::AiRecommendations => "AI Recommendations",
            StageKind::Resources => "Resources",
            StageKind::Competitors => "Competitor Analysis",
            StageKind::ImplementationPlan => "Implementation Plans",
            StageKind::CostBenefit => "Cost-Benefit Analysis",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            StageKind::IndustryResearch => "🔍",
            StageKind::UseCases => "💡",
            StageKind::AiRecommendations => "🤖",
            StageKind::Resources => "📚",
            StageKind::Competitors => "🏁",
            StageKind::ImplementationPlan => "🛠️",
            StageKind::CostBenefit => "💰",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage within a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not executed yet.
    Pending,
    /// Fragment produced and merged.
    Success,
    /// The stage could not produce its fragment.
    Failed,
    /// The stage had nothing to work on (a required earlier fragment is missing).
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Success => write!(f, "success"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            StageStatus::Pending => "⏳",
            StageStatus::Success => "✅",
            StageStatus::Failed => "❌",
            StageStatus::Skipped => "⏭️",
        }
    }
}

/// Status entry for one registered stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub status: StageStatus,
    /// Failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent in the stage.
    #[serde(default)]
    pub duration_ms: u64,
}

impl StageRecord {
    pub fn pending(stage: StageKind) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            error: None,
            duration_ms: 0,
        }
    }
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub relevance_score: f64,
}

/// A source referenced by a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

impl From<&WebResult> for Citation {
    fn from(result: &WebResult) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
        }
    }
}

/// Market and company context gathered by the first stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryResearch {
    pub key_offerings: Vec<String>,
    pub market_trends: Vec<String>,
    pub insights: String,
    pub web_results: Vec<WebResult>,
}

/// One proposed AI/ML use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    pub title: String,
    pub objective: String,
    pub ai_application: String,
    pub cross_functional_benefits: Vec<String>,
    #[serde(default)]
    pub articles: Vec<String>,
}

/// A competitor named by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ai_initiatives: Vec<String>,
}

/// Competitor list plus the positioning payload returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorAnalysis {
    pub competitors: Vec<Competitor>,
    /// Opaque structured payload (SWOT lists, maturity score, summary).
    #[serde(default)]
    pub positioning: Value,
}

/// Implementation roadmap for one use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedUseCase {
    pub use_case: String,
    pub plan: Value,
}

/// Cost-benefit estimate for one planned use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBenefit {
    pub use_case: String,
    pub analysis: Value,
}

/// Fragment produced by a single stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    IndustryResearch(IndustryResearch),
    UseCases(Vec<UseCase>),
    AiRecommendations(String),
    Resources(Vec<String>),
    Competitors(CompetitorAnalysis),
    ImplementationPlan(Vec<PlannedUseCase>),
    CostBenefit(Vec<CostBenefit>),
}

impl StageResult {
    /// The stage kind whose report field this fragment fills.
    pub fn kind(&self) -> StageKind {
        match self {
            StageResult::IndustryResearch(_) => StageKind::IndustryResearch,
            StageResult::UseCases(_) => StageKind::UseCases,
            StageResult::AiRecommendations(_) => StageKind::AiRecommendations,
            StageResult::Resources(_) => StageKind::Resources,
            StageResult::Competitors(_) => StageKind::Competitors,
            StageResult::ImplementationPlan(_) => StageKind::ImplementationPlan,
            StageResult::CostBenefit(_) => StageKind::CostBenefit,
        }
    }
}

/// Stage fragments keyed by stage name. Each one is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_research: Option<IndustryResearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cases: Option<Vec<UseCase>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_recommendations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitors: Option<CompetitorAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_plan: Option<Vec<PlannedUseCase>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_benefit: Option<Vec<CostBenefit>>,
}

impl Fragments {
    /// Key offerings from industry research, if that stage succeeded.
    pub fn key_offerings(&self) -> &[String] {
        self.industry_research
            .as_ref()
            .map(|r| r.key_offerings.as_slice())
            .unwrap_or(&[])
    }

    /// Market trends from industry research, if that stage succeeded.
    pub fn market_trends(&self) -> &[String] {
        self.industry_research
            .as_ref()
            .map(|r| r.market_trends.as_slice())
            .unwrap_or(&[])
    }

    pub fn use_cases(&self) -> &[UseCase] {
        self.use_cases.as_deref().unwrap_or(&[])
    }
}

/// The accumulated research result for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub subject: Subject,
    pub generated_at: DateTime<Utc>,
    /// One entry per registered stage, in pipeline order.
    pub stages: Vec<StageRecord>,
    pub fragments: Fragments,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl Report {
    /// Creates an empty report with every stage pending.
    pub fn pending(subject: Subject, stages: &[StageKind], now: DateTime<Utc>) -> Self {
        Self {
            subject,
            generated_at: now,
            stages: stages.iter().copied().map(StageRecord::pending).collect(),
            fragments: Fragments::default(),
            citations: Vec::new(),
        }
    }

    /// Status of a stage, if it is registered.
    pub fn status_of(&self, stage: StageKind) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.status)
    }

    pub fn count_with_status(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|r| r.status == status).count()
    }

    /// True when any stage did not succeed.
    pub fn is_degraded(&self) -> bool {
        self.stages.iter().any(|r| r.status != StageStatus::Success)
    }

    /// True when no stage produced a fragment.
    pub fn is_all_failed(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|r| r.status == StageStatus::Failed)
    }
}

/// Where a report in a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by running the pipeline during this batch.
    Fresh,
    /// Served from a valid cache entry.
    Cached,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Fresh => write!(f, "fresh"),
            Provenance::Cached => write!(f, "cached"),
        }
    }
}

/// Terminal state of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Aborted => write!(f, "aborted"),
        }
    }
}
