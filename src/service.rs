//! Inference & transform service
//!
//! `StressEstimator` holds the frozen scaler and predictor for the lifetime of
//! the process and answers `estimate` calls as a pure function:
//! scale -> predict -> clamp -> stress transform -> advisory bucket.
//!
//! Inputs are not range-checked on the default path; callers pre-validate or
//! use `estimate_checked`.

use crate::artifact::TrainedPipeline;
use crate::error::TensioError;
use crate::model::CortisolPredictor;
use crate::scaler::ScalerState;
use crate::stress::{clamp_cortisol, cortisol_to_stress, StressLevel};
use crate::types::{FeatureVector, StressEstimate};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Read-only estimator shared freely between callers
#[derive(Clone)]
pub struct StressEstimator {
    scaler: ScalerState,
    predictor: Arc<dyn CortisolPredictor>,
}

impl StressEstimator {
    /// Serve a verified trained pipeline
    pub fn from_pipeline(pipeline: Arc<TrainedPipeline>) -> Result<Self, TensioError> {
        pipeline.verify()?;
        Ok(Self {
            scaler: pipeline.scaler.clone(),
            predictor: pipeline,
        })
    }

    /// Pair a scaler with any predictor, e.g. a test double
    pub fn with_predictor(
        scaler: ScalerState,
        predictor: Arc<dyn CortisolPredictor>,
    ) -> Result<Self, TensioError> {
        scaler.validate()?;
        Ok(Self { scaler, predictor })
    }

    /// Load the artifact once and build the estimator
    pub fn load(path: &Path) -> Result<Self, TensioError> {
        let pipeline = TrainedPipeline::load(path)?;
        Self::from_pipeline(Arc::new(pipeline))
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    /// Estimate cortisol, stress and advice for one input
    pub fn estimate(&self, features: &FeatureVector) -> StressEstimate {
        let standardized = self.scaler.transform(features);
        let cortisol = clamp_cortisol(self.predictor.predict_raw(&standardized));
        let stress = cortisol_to_stress(cortisol);
        let level = StressLevel::from_stress(stress);

        StressEstimate {
            cortisol,
            stress,
            level,
            advice: level.advice().to_string(),
        }
    }

    /// Like `estimate`, but rejects inputs outside the documented ranges
    pub fn estimate_checked(&self, features: &FeatureVector) -> Result<StressEstimate, TensioError> {
        if let Err(e) = features.validate() {
            warn!(error = %e, "rejected out-of-range input");
            return Err(e);
        }
        Ok(self.estimate(features))
    }

    pub fn estimate_batch(&self, inputs: &[FeatureVector]) -> Vec<StressEstimate> {
        inputs.iter().map(|f| self.estimate(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::FeatureScaler;
    use crate::types::FEATURE_COUNT;
    use pretty_assertions::assert_eq;

    struct ConstantPredictor(f64);

    impl CortisolPredictor for ConstantPredictor {
        fn predict_raw(&self, _standardized: &[f64; FEATURE_COUNT]) -> f64 {
            self.0
        }
    }

    /// Predicts the first standardized feature, to observe scaling
    struct EchoPredictor;

    impl CortisolPredictor for EchoPredictor {
        fn predict_raw(&self, standardized: &[f64; FEATURE_COUNT]) -> f64 {
            standardized[0]
        }
    }

    fn unit_scaler() -> ScalerState {
        ScalerState {
            mean: [0.0; FEATURE_COUNT],
            std: [1.0; FEATURE_COUNT],
            samples: 1,
        }
    }

    #[test]
    fn test_negative_prediction_clamped_to_zero() {
        let estimator =
            StressEstimator::with_predictor(unit_scaler(), Arc::new(ConstantPredictor(-4.0)))
                .unwrap();
        let result = estimator.estimate(&FeatureVector::new(4.5, 1.0, 0));

        assert_eq!(result.cortisol, 0.0);
        assert_eq!(result.stress, cortisol_to_stress(0.0));
        assert_eq!(result.level, StressLevel::VeryCalm);
    }

    #[test]
    fn test_midpoint_cortisol_gives_five() {
        let estimator =
            StressEstimator::with_predictor(unit_scaler(), Arc::new(ConstantPredictor(15.0)))
                .unwrap();
        let result = estimator.estimate(&FeatureVector::new(2.0, 0.5, 3));

        assert_eq!(result.stress, 5.0);
        assert_eq!(result.level, StressLevel::Building);
        assert_eq!(result.advice, StressLevel::Building.advice());
    }

    #[test]
    fn test_scaler_applied_before_prediction() {
        let scaler = FeatureScaler::fit(&[
            FeatureVector::new(2.0, 0.0, -1),
            FeatureVector::new(4.0, 2.0, 1),
        ])
        .unwrap();
        let estimator = StressEstimator::with_predictor(scaler, Arc::new(EchoPredictor)).unwrap();

        // sleep 7 -> (7 - 3) / 1
        assert_eq!(estimator.estimate(&FeatureVector::new(7.0, 0.0, 0)).cortisol, 4.0);
    }

    #[test]
    fn test_out_of_range_passes_unchecked_path() {
        let estimator =
            StressEstimator::with_predictor(unit_scaler(), Arc::new(ConstantPredictor(20.0)))
                .unwrap();
        let wild = FeatureVector::new(24.0, -2.0, 40);

        let result = estimator.estimate(&wild);
        assert_eq!(result.cortisol, 20.0);

        assert!(matches!(
            estimator.estimate_checked(&wild),
            Err(TensioError::InputDomain { .. })
        ));
    }

    #[test]
    fn test_rejects_degenerate_scaler() {
        let mut scaler = unit_scaler();
        scaler.std[2] = 0.0;
        assert!(StressEstimator::with_predictor(scaler, Arc::new(EchoPredictor)).is_err());
    }

    #[test]
    fn test_batch_matches_single() {
        let estimator =
            StressEstimator::with_predictor(unit_scaler(), Arc::new(EchoPredictor)).unwrap();
        let inputs = vec![
            FeatureVector::new(1.0, 0.0, 0),
            FeatureVector::new(17.0, 0.0, 0),
        ];
        let batch = estimator.estimate_batch(&inputs);
        assert_eq!(batch[0], estimator.estimate(&inputs[0]));
        assert_eq!(batch[1], estimator.estimate(&inputs[1]));
    }

    #[test]
    fn test_estimator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StressEstimator>();
    }
}
