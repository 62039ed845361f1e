//! Batch coordination: one report per requested company.
//!
//! Subjects run strictly in caller order. Each one is served from the cache
//! when a fresh entry exists; otherwise the pipeline runs and the result is
//! written back. Cancellation is observed between subjects.

use crate::cache::CacheStore;
use crate::error::BatchError;
use crate::events::{ProgressEvent, ProgressSink};
use crate::models::{BatchStatus, Provenance, Report, Subject};
use crate::pipeline::PipelineExecutor;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-request options passed explicitly through the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Skip cache lookups; fresh reports are still written back.
    pub bypass_cache: bool,
    /// Who asked for the batch, for log lines only.
    pub requested_by: Option<String>,
}

/// Companies to research within one industry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub companies: Vec<String>,
    pub industry: String,
    pub context: RequestContext,
}

impl BatchRequest {
    pub fn new(companies: Vec<String>, industry: impl Into<String>) -> Self {
        Self {
            companies,
            industry: industry.into(),
            context: RequestContext::default(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Validated subjects in request order. Duplicates are kept.
    pub fn subjects(&self) -> Result<Vec<Subject>, BatchError> {
        let industry = self.industry.trim();
        if industry.is_empty() {
            return Err(BatchError::EmptyIndustry);
        }
        if self.companies.is_empty() {
            return Err(BatchError::NoSubjects);
        }

        self.companies
            .iter()
            .enumerate()
            .map(|(i, company)| {
                let company = company.trim();
                if company.is_empty() {
                    Err(BatchError::EmptyCompany(i + 1))
                } else {
                    Ok(Subject::new(company, industry))
                }
            })
            .collect()
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One finished subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectOutcome {
    pub report: Report,
    pub provenance: Provenance,
}

/// State of a batch, returned once it stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRun {
    pub status: BatchStatus,
    pub industry: String,
    /// Finished subjects in request order.
    pub outcomes: Vec<SubjectOutcome>,
    /// Number of subjects in the request.
    pub requested: usize,
    /// Index of the subject being processed (or last processed).
    pub cursor: usize,
    /// Stage invocations performed by fresh pipeline runs.
    pub stage_invocations: usize,
}

impl BatchRun {
    fn new(industry: &str, requested: usize) -> Self {
        Self {
            status: BatchStatus::Running,
            industry: industry.to_string(),
            outcomes: Vec::with_capacity(requested),
            requested,
            cursor: 0,
            stage_invocations: 0,
        }
    }

    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.outcomes.iter().map(|o| &o.report)
    }

    pub fn is_aborted(&self) -> bool {
        self.status == BatchStatus::Aborted
    }

    pub fn cached_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.provenance == Provenance::Cached)
            .count()
    }

    pub fn degraded_count(&self) -> usize {
        self.reports().filter(|r| r.is_degraded()).count()
    }
}

/// Drives the pipeline over every subject of a request.
pub struct BatchCoordinator {
    executor: PipelineExecutor,
    cache: Arc<dyn CacheStore>,
}

impl BatchCoordinator {
    pub fn new(executor: PipelineExecutor, cache: Arc<dyn CacheStore>) -> Self {
        Self { executor, cache }
    }

    /// Produce one report per requested company.
    ///
    /// Returns an error only for an invalid request; stage and cache failures
    /// are absorbed into the reports and the logs.
    pub async fn run(
        &self,
        request: &BatchRequest,
        sink: &dyn ProgressSink,
        abort: &AbortSignal,
    ) -> Result<BatchRun, BatchError> {
        let subjects = request.subjects()?;
        let total = subjects.len();
        let mut run = BatchRun::new(request.industry.trim(), total);

        match request.context.requested_by {
            Some(ref who) => info!("Batch of {} subject(s) requested by {}", total, who),
            None => info!("Batch of {} subject(s)", total),
        }

        sink.emit(ProgressEvent::BatchStarted {
            total,
            industry: run.industry.clone(),
        });

        for (index, subject) in subjects.iter().enumerate() {
            if abort.is_aborted() {
                warn!(
                    "Batch aborted after {} of {} subject(s)",
                    run.outcomes.len(),
                    total
                );
                run.status = BatchStatus::Aborted;
                break;
            }

            run.cursor = index;
            sink.emit(ProgressEvent::SubjectStarted {
                index,
                total,
                company: subject.company.clone(),
            });

            let outcome = self.process(subject, index, request, sink, &mut run).await;

            sink.emit(ProgressEvent::SubjectCompleted {
                index,
                provenance: outcome.provenance,
                report: Box::new(outcome.report.clone()),
            });
            run.outcomes.push(outcome);
        }

        if run.status == BatchStatus::Running {
            run.status = BatchStatus::Completed;
        }

        sink.emit(ProgressEvent::BatchFinished {
            status: run.status,
            completed: run.outcomes.len(),
        });

        Ok(run)
    }

    async fn process(
        &self,
        subject: &Subject,
        index: usize,
        request: &BatchRequest,
        sink: &dyn ProgressSink,
        run: &mut BatchRun,
    ) -> SubjectOutcome {
        let fingerprint = subject.fingerprint();

        if !request.context.bypass_cache {
            match self.cache.lookup(&fingerprint) {
                Ok(Some(report)) => {
                    info!("Using cached report for {}", subject);
                    sink.emit(ProgressEvent::CacheHit { index });
                    return SubjectOutcome {
                        report,
                        provenance: Provenance::Cached,
                    };
                }
                Ok(None) => debug!("No fresh cache entry for {}", fingerprint),
                Err(e) => warn!("Cache lookup failed for {}, treating as miss: {}", fingerprint, e),
            }
        }

        let report = self.executor.execute(subject, index, sink).await;
        run.stage_invocations += report.stages.len();

        if let Err(e) = self.cache.put(&fingerprint, &report) {
            warn!("Failed to cache report for {}: {}", fingerprint, e);
        }

        SubjectOutcome {
            report,
            provenance: Provenance::Fresh,
        }
    }
}
