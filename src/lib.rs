//! TENSIO - Behavioral stress estimation
//!
//! TENSIO estimates a latent stress score from three everyday inputs (sleep,
//! exercise, event valence) through a deterministic pipeline:
//! standardization → cortisol regression → cortisol floor → logistic stress
//! transform → advisory bucket.
//!
//! ## Modules
//!
//! - **Offline training**: synthesize labeled data, fit the scaler and the
//!   3→16→8→1 regression network, persist one verified artifact
//! - **Inference**: load the artifact once and serve pure `estimate` calls

pub mod artifact;
pub mod config;
pub mod error;
pub mod model;
pub mod scaler;
pub mod service;
pub mod stress;
pub mod synth;
pub mod trainer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use artifact::TrainedPipeline;
pub use config::{PipelineConfig, SynthesisConfig, TrainingConfig};
pub use error::TensioError;
pub use service::StressEstimator;
pub use stress::StressLevel;
pub use trainer::{Trainer, TrainingReport};
pub use types::{FeatureVector, StressEstimate};

/// TENSIO version embedded in every artifact
pub const TENSIO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for artifacts
pub const PRODUCER_NAME: &str = "tensio";
