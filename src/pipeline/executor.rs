//! Runs the registered stages for one subject.

use crate::clock::Clock;
use crate::error::StageFailure;
use crate::events::{ProgressEvent, ProgressSink};
use crate::models::{Report, Subject};
use crate::pipeline::{accumulator, StageRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Sequential stage runner.
///
/// Every stage is invoked in registry order with the report accumulated so
/// far. A failing or timed-out stage is recorded and the run continues, so
/// `execute` always yields a report with one status per registered stage.
pub struct PipelineExecutor {
    registry: Arc<StageRegistry>,
    stage_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<StageRegistry>, stage_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            stage_timeout,
            clock,
        }
    }

    /// Run the whole pipeline for `subject`.
    ///
    /// `index` identifies the subject within its batch for progress events.
    pub async fn execute(&self, subject: &Subject, index: usize, sink: &dyn ProgressSink) -> Report {
        let kinds = self.registry.kinds();
        let total_steps = kinds.len();
        let mut report = Report::pending(subject.clone(), &kinds, self.clock.now());

        info!("Running {} stages for {}", total_steps, subject);

        for (step, stage) in self.registry.iter().enumerate() {
            let kind = stage.kind();
            sink.emit(ProgressEvent::StageStarted {
                index,
                stage: kind,
                step: step + 1,
                total_steps,
            });

            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.stage_timeout, stage.run(subject, &report)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StageFailure::Timeout(self.stage_timeout)),
            };
            let elapsed = started.elapsed();

            let status = accumulator::fold(&mut report, kind, outcome, elapsed);
            debug!("Stage {} finished as {} in {:?}", kind, status, elapsed);

            sink.emit(ProgressEvent::StageFinished {
                index,
                stage: kind,
                status,
            });
        }

        report.generated_at = self.clock.now();
        report
    }
}
