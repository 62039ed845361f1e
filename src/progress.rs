//! Terminal progress display for batch runs.

use crate::events::{ProgressEvent, ProgressSink};
use crate::models::{BatchStatus, Provenance, StageStatus};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

/// Two-level progress: one bar for the batch, one for the current subject's stages.
pub struct ConsoleProgress {
    multi: MultiProgress,
    overall: Mutex<Option<ProgressBar>>,
    subject: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            overall: Mutex::new(None),
            subject: Mutex::new(None),
        }
    }

    fn overall_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }

    fn subject_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("   {prefix:.bold} [{bar:30.green/white}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_overall(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(ref bar) = *self.overall.lock().unwrap_or_else(|e| e.into_inner()) {
            f(bar);
        }
    }

    fn with_subject(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(ref bar) = *self.subject.lock().unwrap_or_else(|e| e.into_inner()) {
            f(bar);
        }
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total, industry } => {
                let bar = self.multi.add(ProgressBar::new(total as u64));
                bar.set_style(Self::overall_style());
                bar.set_message(format!("researching {}", industry));
                *self.overall.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
            }
            ProgressEvent::SubjectStarted {
                index,
                total,
                company,
            } => {
                let bar = self.multi.add(ProgressBar::new(0));
                bar.set_style(Self::subject_style());
                bar.set_prefix(format!("[{}/{}] {}", index + 1, total, company));
                self.with_overall(|overall| overall.set_message(company.clone()));
                *self.subject.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
            }
            ProgressEvent::CacheHit { .. } => {
                self.with_subject(|bar| bar.set_message("♻️  served from cache"));
            }
            ProgressEvent::StageStarted {
                stage,
                step,
                total_steps,
                ..
            } => {
                self.with_subject(|bar| {
                    bar.set_length(total_steps as u64);
                    bar.set_position(step.saturating_sub(1) as u64);
                    bar.set_message(format!("{} {}", stage.emoji(), stage.label()));
                });
            }
            ProgressEvent::StageFinished { stage, status, .. } => {
                self.with_subject(|bar| bar.inc(1));
                if status != StageStatus::Success {
                    self.println(format!(
                        "   {} {} {}",
                        status.emoji(),
                        stage.label(),
                        status
                    ));
                }
            }
            ProgressEvent::SubjectCompleted {
                provenance, report, ..
            } => {
                let ok = report.count_with_status(StageStatus::Success);
                let summary = match provenance {
                    Provenance::Cached => format!("♻️  cached ({}/{} stages ok)", ok, report.stages.len()),
                    Provenance::Fresh => format!("✅ done ({}/{} stages ok)", ok, report.stages.len()),
                };
                self.with_subject(|bar| bar.finish_with_message(summary));
                self.with_overall(|overall| overall.inc(1));
            }
            ProgressEvent::BatchFinished { status, completed } => {
                let message = format!("{} ({} report(s))", status, completed);
                self.with_overall(|overall| match status {
                    BatchStatus::Aborted => overall.abandon_with_message(message),
                    _ => overall.finish_with_message(message),
                });
            }
        }
    }
}
