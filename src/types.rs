//! Core types for the TENSIO pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: behavioral feature vectors, labeled training examples, and the
//! final cortisol/stress estimate.

use crate::error::TensioError;
use crate::stress::StressLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Number of input features, fixed at train and inference time
pub const FEATURE_COUNT: usize = 3;

/// Feature names in their fixed order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["sleep_hours", "exercise_hours", "event_score"];

/// Documented sleep range (hours)
pub const SLEEP_RANGE: RangeInclusive<f64> = 0.0..=7.5;

/// Documented exercise range (hours)
pub const EXERCISE_RANGE: RangeInclusive<f64> = 0.0..=3.0;

/// Documented event valence range (negative to positive)
pub const EVENT_RANGE: RangeInclusive<i32> = -5..=5;

/// Behavioral inputs for one estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Sleep duration (hours, 0-7.5)
    pub sleep_hours: f64,
    /// Exercise duration (hours, 0-3)
    pub exercise_hours: f64,
    /// Event valence (-5 negative .. 5 positive)
    pub event_score: i32,
}

impl FeatureVector {
    pub fn new(sleep_hours: f64, exercise_hours: f64, event_score: i32) -> Self {
        Self {
            sleep_hours,
            exercise_hours,
            event_score,
        }
    }

    /// Features as an ordered array (sleep, exercise, event)
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.sleep_hours,
            self.exercise_hours,
            f64::from(self.event_score),
        ]
    }

    /// Check every field against its documented range.
    ///
    /// The default inference path never calls this; callers that want
    /// rejection instead of degraded output opt in explicitly.
    pub fn validate(&self) -> Result<(), TensioError> {
        check_range("sleep_hours", self.sleep_hours, &SLEEP_RANGE)?;
        check_range("exercise_hours", self.exercise_hours, &EXERCISE_RANGE)?;

        if !EVENT_RANGE.contains(&self.event_score) {
            return Err(TensioError::InputDomain {
                field: "event_score",
                value: f64::from(self.event_score),
                min: f64::from(*EVENT_RANGE.start()),
                max: f64::from(*EVENT_RANGE.end()),
            });
        }

        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), TensioError> {
    // NaN fails `contains`, so it is rejected here as well
    if range.contains(&value) {
        Ok(())
    } else {
        Err(TensioError::InputDomain {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// One labeled synthetic sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    /// Cortisol label (>= 0)
    pub cortisol: f64,
}

/// Immutable collection of training examples produced by one synthesis run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    examples: Vec<TrainingExample>,
}

impl Dataset {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn features(&self) -> Vec<FeatureVector> {
        self.examples.iter().map(|e| e.features).collect()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.cortisol).collect()
    }

    /// Build a new dataset from the rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            examples: indices.iter().map(|&i| self.examples[i]).collect(),
        }
    }
}

/// Result of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressEstimate {
    /// Predicted cortisol concentration, clamped to >= 0
    pub cortisol: f64,
    /// Stress score, soft-bounded in (0, 10)
    pub stress: f64,
    /// Advisory bucket
    pub level: StressLevel,
    /// Advisory text for the bucket
    pub advice: String,
}

impl fmt::Display for StressEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cortisol {:.2} | stress {:.2} / 10 | {}",
            self.cortisol, self.stress, self.advice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order() {
        let fv = FeatureVector::new(6.0, 1.5, -3);
        assert_eq!(fv.to_array(), [6.0, 1.5, -3.0]);
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(FeatureVector::new(0.0, 0.0, -5).validate().is_ok());
        assert!(FeatureVector::new(7.5, 3.0, 5).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = FeatureVector::new(8.0, 1.0, 0).validate().unwrap_err();
        assert!(matches!(
            err,
            TensioError::InputDomain {
                field: "sleep_hours",
                ..
            }
        ));

        let err = FeatureVector::new(4.0, 1.0, 6).validate().unwrap_err();
        assert!(matches!(
            err,
            TensioError::InputDomain {
                field: "event_score",
                ..
            }
        ));

        assert!(FeatureVector::new(4.0, f64::NAN, 0).validate().is_err());
    }

    #[test]
    fn test_dataset_select() {
        let examples = (0..4)
            .map(|i| TrainingExample {
                features: FeatureVector::new(i as f64, 0.0, 0),
                cortisol: 10.0 + i as f64,
            })
            .collect();
        let dataset = Dataset::new(examples);

        let subset = dataset.select(&[3, 1]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.labels(), vec![13.0, 11.0]);
    }
}
