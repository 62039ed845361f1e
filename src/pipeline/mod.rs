//! Stage interface and the ordered stage registry.
//!
//! A pipeline is a fixed, ordered list of stages. Each stage reads the report
//! accumulated so far and returns one fragment; it never mutates prior state.

pub mod accumulator;
pub mod executor;

pub use executor::PipelineExecutor;

use crate::error::{RegistryError, StageFailure};
use crate::models::{Citation, Report, StageKind, StageResult, Subject};
use async_trait::async_trait;
use std::sync::Arc;

/// What a stage hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub result: StageResult,
    pub citations: Vec<Citation>,
}

impl StageOutput {
    pub fn new(result: StageResult) -> Self {
        Self {
            result,
            citations: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// One analysis step.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The report field this stage fills.
    fn kind(&self) -> StageKind;

    /// Produce this stage's fragment from the subject and the report so far.
    async fn run(&self, subject: &Subject, prior: &Report) -> Result<StageOutput, StageFailure>;
}

/// Ordered set of stages, at most one per kind.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage to the end of the pipeline.
    pub fn register(mut self, stage: Arc<dyn Stage>) -> Result<Self, RegistryError> {
        let kind = stage.kind();
        if self.stages.iter().any(|s| s.kind() == kind) {
            return Err(RegistryError::DuplicateStage(kind));
        }
        self.stages.push(stage);
        Ok(self)
    }

    /// Stage kinds in execution order.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Stage>> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeStage;
    use super::*;

    #[test]
    fn test_registry_preserves_order() {
        let registry = StageRegistry::new()
            .register(Arc::new(FakeStage::succeeding(StageKind::Resources)))
            .unwrap()
            .register(Arc::new(FakeStage::succeeding(StageKind::IndustryResearch)))
            .unwrap();

        assert_eq!(
            registry.kinds(),
            vec![StageKind::Resources, StageKind::IndustryResearch]
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = StageRegistry::new()
            .register(Arc::new(FakeStage::succeeding(StageKind::UseCases)))
            .unwrap()
            .register(Arc::new(FakeStage::succeeding(StageKind::UseCases)));

        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateStage(StageKind::UseCases))
        );
    }
}
