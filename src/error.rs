//! Error types for the research pipeline.
//!
//! Stage, cache, and configuration failures are recovered (or reported)
//! at different boundaries, so each gets its own type.

use crate::models::StageKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an LLM or web-search provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider quota exceeded: {0}")]
    Quota(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider returned an empty answer")]
    Empty,
}

/// Why a single stage could not produce its fragment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited: {0}")]
    Quota(String),
    #[error("malformed model output: {0}")]
    Malformed(String),
    #[error("empty model output")]
    Empty,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// A required fragment from an earlier stage is absent.
    #[error("missing input: {0}")]
    MissingInput(String),
}

impl StageFailure {
    /// Missing inputs are recorded as skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, StageFailure::MissingInput(_))
    }
}

impl From<ProviderError> for StageFailure {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Network(msg) => StageFailure::Network(msg),
            ProviderError::Quota(msg) => StageFailure::Quota(msg),
            ProviderError::Malformed(msg) => StageFailure::Malformed(msg),
            ProviderError::Empty => StageFailure::Empty,
        }
    }
}

/// Storage failure in the report cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupted cache entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to walk cache directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Missing or invalid configuration, detected before any subject runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Invalid stage registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("stage {0} is registered twice")]
    DuplicateStage(StageKind),
}

/// Rejected batch request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("no companies were requested")]
    NoSubjects,
    #[error("industry must not be empty")]
    EmptyIndustry,
    #[error("company name at position {0} is empty")]
    EmptyCompany(usize),
}
