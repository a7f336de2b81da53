//! Trained pipeline artifact
//!
//! The scaler and the model are persisted together as one versioned JSON
//! document. A compatibility tag (the scaler fingerprint) is embedded both in
//! the bundle and in the model, so a model can never be served with a scaler
//! it was not trained against.

use crate::error::TensioError;
use crate::model::{CortisolPredictor, ModelParameters};
use crate::scaler::ScalerState;
use crate::trainer::TrainingReport;
use crate::types::FEATURE_COUNT;
use crate::{PRODUCER_NAME, TENSIO_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Current artifact format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default artifact file name
pub const DEFAULT_ARTIFACT_FILE: &str = "tensio_pipeline.json";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactProducer {
    pub name: String,
    pub version: String,
}

/// Scaler and model bundled with provenance and the training report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub format_version: u32,
    pub pipeline_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub producer: ArtifactProducer,
    /// Fingerprint of `scaler`; must also match `model.scaler_fingerprint`
    pub compatibility_tag: String,
    pub scaler: ScalerState,
    pub model: ModelParameters,
    pub report: TrainingReport,
}

impl TrainedPipeline {
    /// Bundle a freshly trained scaler/model pair
    pub fn new(scaler: ScalerState, model: ModelParameters, report: TrainingReport) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            pipeline_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            producer: ArtifactProducer {
                name: PRODUCER_NAME.to_string(),
                version: TENSIO_VERSION.to_string(),
            },
            compatibility_tag: scaler.fingerprint(),
            scaler,
            model,
            report,
        }
    }

    /// Check format version, topology and scaler/model pairing
    pub fn verify(&self) -> Result<(), TensioError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(TensioError::IncompatibleArtifact(format!(
                "format version {} is not supported (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        self.scaler.validate()?;
        self.model.validate()?;

        let fingerprint = self.scaler.fingerprint();
        if self.compatibility_tag != fingerprint {
            return Err(TensioError::IncompatibleArtifact(
                "compatibility tag does not match the bundled scaler".into(),
            ));
        }
        if self.model.scaler_fingerprint != fingerprint {
            return Err(TensioError::IncompatibleArtifact(
                "model was trained against a different scaler".into(),
            ));
        }
        Ok(())
    }

    /// Parse and verify an artifact
    pub fn from_json(json: &str) -> Result<Self, TensioError> {
        let pipeline: Self = serde_json::from_str(json)?;
        pipeline.verify()?;
        Ok(pipeline)
    }

    pub fn to_json(&self) -> Result<String, TensioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and verify an artifact from disk
    pub fn load(path: &Path) -> Result<Self, TensioError> {
        let json = fs::read_to_string(path)?;
        let pipeline = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            pipeline_id = %pipeline.pipeline_id,
            "loaded trained pipeline"
        );
        Ok(pipeline)
    }

    /// Persist the artifact.
    ///
    /// Writes a sibling temporary file and renames it over `path`, so readers
    /// only ever observe a complete artifact.
    pub fn save(&self, path: &Path) -> Result<(), TensioError> {
        self.verify()?;
        let json = self.to_json()?;
        let tmp = temp_path(path);

        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            path = %path.display(),
            pipeline_id = %self.pipeline_id,
            "saved trained pipeline"
        );
        Ok(())
    }
}

impl CortisolPredictor for TrainedPipeline {
    fn predict_raw(&self, standardized: &[f64; FEATURE_COUNT]) -> f64 {
        self.model.predict(standardized)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_FILE.to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SynthesisConfig, TrainingConfig};
    use crate::trainer::Trainer;
    use pretty_assertions::assert_eq;

    fn quick_pipeline() -> TrainedPipeline {
        let config = PipelineConfig {
            synthesis: SynthesisConfig {
                samples: 100,
                seed: 5,
            },
            training: TrainingConfig {
                epochs: 2,
                ..Default::default()
            },
        };
        Trainer::new(config).unwrap().run().unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ARTIFACT_FILE);
        let pipeline = quick_pipeline();

        pipeline.save(&path).unwrap();
        let loaded = TrainedPipeline::load(&path).unwrap();

        assert_eq!(loaded, pipeline);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_missing_artifact_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrainedPipeline::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, TensioError::ArtifactIo(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_corrupt_artifact_is_json_error() {
        assert!(matches!(
            TrainedPipeline::from_json("{not json"),
            Err(TensioError::Json(_))
        ));
    }

    #[test]
    fn test_swapped_scaler_rejected() {
        let mut pipeline = quick_pipeline();
        pipeline.scaler.mean[0] += 0.25;
        pipeline.compatibility_tag = pipeline.scaler.fingerprint();

        let json = pipeline.to_json().unwrap();
        let err = TrainedPipeline::from_json(&json).unwrap_err();
        assert!(matches!(err, TensioError::IncompatibleArtifact(_)));
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let mut pipeline = quick_pipeline();
        pipeline.compatibility_tag = "0".repeat(64);
        assert!(pipeline.verify().is_err());
    }

    #[test]
    fn test_future_format_rejected() {
        let mut pipeline = quick_pipeline();
        pipeline.format_version = ARTIFACT_FORMAT_VERSION + 1;
        assert!(matches!(
            pipeline.verify(),
            Err(TensioError::IncompatibleArtifact(_))
        ));
    }

    #[test]
    fn test_save_refuses_invalid_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ARTIFACT_FILE);
        let mut pipeline = quick_pipeline();
        pipeline.model.scaler_fingerprint.clear();

        assert!(pipeline.save(&path).is_err());
        assert!(!path.exists());
    }
}
