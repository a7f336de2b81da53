//! Error types for TENSIO

use thiserror::Error;

/// Errors that can occur while training, persisting or serving a pipeline.
///
/// Input values outside the documented feature ranges are not errors on the
/// default inference path; `InputDomain` is only produced by the opt-in
/// validating calls.
#[derive(Debug, Error)]
pub enum TensioError {
    #[error("Feature '{feature}' has zero variance in the fit set")]
    ZeroVariance { feature: &'static str },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Artifact I/O error: {0}")]
    ArtifactIo(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Incompatible artifact: {0}")]
    IncompatibleArtifact(String),

    #[error("Input '{field}' = {value} outside documented range [{min}, {max}]")]
    InputDomain {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Non-finite value during training: {0}")]
    NonFinite(String),
}

impl TensioError {
    /// Configuration errors abort the whole pipeline and are never retried.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TensioError::ZeroVariance { .. }
                | TensioError::EmptyDataset(_)
                | TensioError::InvalidConfig(_)
                | TensioError::ArtifactIo(_)
                | TensioError::Json(_)
                | TensioError::IncompatibleArtifact(_)
        )
    }
}
