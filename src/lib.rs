//! Loan Default Risk Pipeline Library
//!
//! Feature preparation and inference for consumer loan applications:
//! FICO tiering and bureau-field imputation, macro-economic snapshot,
//! schema-aligned feature assembly, linear scoring and decision banding.

pub mod config;
pub mod feature_extractor;
pub mod imputer;
pub mod macro_snapshot;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod types;

use std::path::PathBuf;

pub use config::AppConfig;
pub use feature_extractor::{FeatureAssembler, FeatureVector};
pub use imputer::{FicoTier, ImputationTable};
pub use macro_snapshot::MacroSnapshot;
pub use models::{ModelBundle, Scorer};
pub use pipeline::{predict, ReferenceStore, ScoringContext};
pub use types::{ApplicationRecord, Decision, PredictionResult, RiskTier};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse CSV from {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("Column '{column}' not found in {origin}")]
    MissingColumn { origin: String, column: String },

    #[error("Invalid value '{value}' in column '{column}' of {origin}")]
    InvalidObservation {
        origin: String,
        column: String,
        value: String,
    },

    #[error("Series '{column}' in {origin} has no non-missing observations")]
    EmptySeries { origin: String, column: String },

    #[error("Malformed model bundle: {0}")]
    MalformedBundle(String),

    #[error("FICO tier '{0}' not present in imputation table")]
    UnknownTier(String),

    #[error("Feature vector has {actual} values, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl PipelineError {
    /// Whether the failure comes from process-global reference data rather
    /// than from the request. The HTTP layer maps these to 503.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            PipelineError::Io { .. }
                | PipelineError::Json { .. }
                | PipelineError::Csv { .. }
                | PipelineError::MissingColumn { .. }
                | PipelineError::InvalidObservation { .. }
                | PipelineError::EmptySeries { .. }
                | PipelineError::MalformedBundle(_)
        )
    }
}
