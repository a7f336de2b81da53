//! Feature standardization
//!
//! This module fits and applies per-feature standardization:
//! - Mean and population standard deviation per feature, fit once on the train split
//! - `(x - mean) / std` applied identically at train and inference time
//! - A fingerprint that ties a trained model to the exact scaler it was fit with

use crate::error::TensioError;
use crate::types::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Standard deviations below this are treated as zero variance
const MIN_STD: f64 = 1e-12;

/// Fitted per-feature statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    /// Per-feature mean (sleep, exercise, event)
    pub mean: [f64; FEATURE_COUNT],
    /// Per-feature population standard deviation
    pub std: [f64; FEATURE_COUNT],
    /// Number of rows the statistics were computed from
    pub samples: usize,
}

/// Fits `ScalerState` from training features
pub struct FeatureScaler;

impl FeatureScaler {
    /// Compute per-feature mean and standard deviation.
    ///
    /// A feature with zero variance cannot be standardized and aborts the fit.
    pub fn fit(features: &[FeatureVector]) -> Result<ScalerState, TensioError> {
        if features.is_empty() {
            return Err(TensioError::EmptyDataset(
                "cannot fit scaler on zero rows".into(),
            ));
        }

        let n = features.len() as f64;
        let rows: Vec<[f64; FEATURE_COUNT]> = features.iter().map(|f| f.to_array()).collect();

        let mut mean = [0.0; FEATURE_COUNT];
        for row in &rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut std = [0.0; FEATURE_COUNT];
        for row in &rows {
            for ((s, x), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
        }

        let state = ScalerState {
            mean,
            std,
            samples: features.len(),
        };
        state.validate()?;
        Ok(state)
    }
}

impl ScalerState {
    /// Check that every feature can be standardized
    pub fn validate(&self) -> Result<(), TensioError> {
        for (i, (&m, &s)) in self.mean.iter().zip(&self.std).enumerate() {
            if !m.is_finite() || !s.is_finite() || s < MIN_STD {
                return Err(TensioError::ZeroVariance {
                    feature: FEATURE_NAMES[i],
                });
            }
        }
        Ok(())
    }

    /// Standardize one feature vector
    pub fn transform(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = features.to_array();
        for ((x, m), s) in out.iter_mut().zip(&self.mean).zip(&self.std) {
            *x = (*x - m) / s;
        }
        out
    }

    /// Standardize a batch of feature vectors
    pub fn transform_all(&self, features: &[FeatureVector]) -> Vec<[f64; FEATURE_COUNT]> {
        features.iter().map(|f| self.transform(f)).collect()
    }

    /// Hex SHA-256 over the fitted statistics.
    ///
    /// Models record the fingerprint of the scaler they were trained against.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"tensio.scaler.v1");
        for v in self.mean.iter().chain(&self.std) {
            hasher.update(v.to_le_bytes());
        }
        hasher.update((self.samples as u64).to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Load scaler state from JSON
    pub fn from_json(json: &str) -> Result<Self, TensioError> {
        let state: Self = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }

    /// Serialize scaler state to JSON
    pub fn to_json(&self) -> Result<String, TensioError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::synth::Synthesizer;
    use proptest::prelude::*;

    fn column_stats(rows: &[[f64; FEATURE_COUNT]], col: usize) -> (f64, f64) {
        let n = rows.len() as f64;
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_fit_known_values() {
        let features = vec![
            FeatureVector::new(2.0, 0.0, -1),
            FeatureVector::new(4.0, 2.0, 1),
        ];
        let state = FeatureScaler::fit(&features).unwrap();

        assert_eq!(state.mean, [3.0, 1.0, 0.0]);
        assert_eq!(state.std, [1.0, 1.0, 1.0]);
        assert_eq!(state.transform(&features[0]), [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_standardizes_training_set() {
        let dataset = Synthesizer::generate(&SynthesisConfig::default());
        let features = dataset.features();
        let state = FeatureScaler::fit(&features).unwrap();
        let scaled = state.transform_all(&features);

        for col in 0..FEATURE_COUNT {
            let (mean, std) = column_stats(&scaled, col);
            assert!(mean.abs() < 1e-9, "col {col} mean {mean}");
            assert!((std - 1.0).abs() < 1e-9, "col {col} std {std}");
        }
    }

    #[test]
    fn test_zero_variance_is_fatal() {
        let features = vec![
            FeatureVector::new(5.0, 0.5, 0),
            FeatureVector::new(5.0, 1.5, 2),
        ];
        let err = FeatureScaler::fit(&features).unwrap_err();
        assert!(matches!(
            err,
            TensioError::ZeroVariance {
                feature: "sleep_hours"
            }
        ));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_empty_fit_rejected() {
        assert!(matches!(
            FeatureScaler::fit(&[]),
            Err(TensioError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_preserves_fingerprint() {
        let dataset = Synthesizer::generate(&SynthesisConfig {
            samples: 100,
            seed: 3,
        });
        let state = FeatureScaler::fit(&dataset.features()).unwrap();
        let loaded = ScalerState::from_json(&state.to_json().unwrap()).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.fingerprint(), state.fingerprint());
    }

    #[test]
    fn test_corrupt_json_rejects_zero_std() {
        let json = r#"{"mean":[1.0,1.0,0.0],"std":[1.0,0.0,1.0],"samples":10}"#;
        assert!(matches!(
            ScalerState::from_json(json),
            Err(TensioError::ZeroVariance {
                feature: "exercise_hours"
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_fit_then_transform_is_standard(seed in any::<u64>(), samples in 20usize..300) {
            let dataset = Synthesizer::generate(&SynthesisConfig { samples, seed });
            let features = dataset.features();
            // Tiny samples can occasionally draw a single event value
            if let Ok(state) = FeatureScaler::fit(&features) {
                let scaled = state.transform_all(&features);
                for col in 0..FEATURE_COUNT {
                    let (mean, std) = column_stats(&scaled, col);
                    prop_assert!(mean.abs() < 1e-8);
                    prop_assert!((std - 1.0).abs() < 1e-8);
                }
            }
        }
    }
}
