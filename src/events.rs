//! Progress events emitted while a batch runs.
//!
//! The presentation layer implements [`ProgressSink`]; the coordinator and
//! executor only ever push events into it.

use crate::models::{BatchStatus, Provenance, Report, StageKind, StageStatus};

/// A live progress signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    BatchStarted {
        total: usize,
        industry: String,
    },
    SubjectStarted {
        index: usize,
        total: usize,
        company: String,
    },
    CacheHit {
        index: usize,
    },
    StageStarted {
        index: usize,
        stage: StageKind,
        step: usize,
        total_steps: usize,
    },
    StageFinished {
        index: usize,
        stage: StageKind,
        status: StageStatus,
    },
    SubjectCompleted {
        index: usize,
        provenance: Provenance,
        report: Box<Report>,
    },
    BatchFinished {
        status: BatchStatus,
        completed: usize,
    },
}

impl ProgressEvent {
    /// Subject index the event belongs to, if any.
    pub fn subject_index(&self) -> Option<usize> {
        match self {
            ProgressEvent::SubjectStarted { index, .. }
            | ProgressEvent::CacheHit { index }
            | ProgressEvent::StageStarted { index, .. }
            | ProgressEvent::StageFinished { index, .. }
            | ProgressEvent::SubjectCompleted { index, .. } => Some(*index),
            ProgressEvent::BatchStarted { .. } | ProgressEvent::BatchFinished { .. } => None,
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards all events (used with `--quiet`).
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Sink that records every event, for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
