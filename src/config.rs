//! Pipeline configuration
//!
//! Plain serde structs whose `Default` impls carry the documented constants.
//! The CLI can load a `PipelineConfig` from JSON and override single fields.

use crate::error::TensioError;
use serde::{Deserialize, Serialize};

/// Default synthetic sample count
pub const DEFAULT_SAMPLES: usize = 1000;

/// Default seed for synthesis, splitting and initialisation
pub const DEFAULT_SEED: u64 = 42;

/// Data synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Number of examples to generate
    pub samples: usize,
    /// RNG seed; identical seeds produce identical datasets
    pub seed: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

/// Model training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fixed number of passes over the fit slice (no early stopping)
    pub epochs: usize,
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Fraction of the dataset held out as the test split
    pub test_fraction: f64,
    /// Fraction of the train split used for validation monitoring
    pub validation_fraction: f64,
    pub split_seed: u64,
    pub init_seed: u64,
    /// Reshuffle the fit slice every epoch
    pub shuffle: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            test_fraction: 0.2,
            validation_fraction: 0.2,
            split_seed: DEFAULT_SEED,
            init_seed: DEFAULT_SEED,
            shuffle: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TensioError> {
        if self.epochs == 0 {
            return Err(TensioError::InvalidConfig("epochs must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(TensioError::InvalidConfig("batch_size must be > 0".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TensioError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(TensioError::InvalidConfig(
                "beta1 and beta2 must lie in [0, 1)".into(),
            ));
        }
        if !(self.epsilon > 0.0) {
            return Err(TensioError::InvalidConfig("epsilon must be > 0".into()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TensioError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(TensioError::InvalidConfig(format!(
                "validation_fraction must lie in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Full offline pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub synthesis: SynthesisConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, TensioError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TensioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TensioError> {
        if self.synthesis.samples == 0 {
            return Err(TensioError::InvalidConfig("samples must be > 0".into()));
        }
        self.training.validate()
    }
}
