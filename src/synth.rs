//! Synthetic ground-truth generation
//!
//! Produces labeled (features -> cortisol) examples from a fixed linear formula
//! plus Gaussian noise. Generation is fully determined by the seed.

use crate::config::SynthesisConfig;
use crate::types::{
    Dataset, FeatureVector, TrainingExample, EVENT_RANGE, EXERCISE_RANGE, SLEEP_RANGE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

/// Cortisol level with every deviation term at zero
pub const CORTISOL_BIAS: f64 = 15.0;

/// Cortisol change per hour of sleep above the centre
pub const SLEEP_COEFFICIENT: f64 = -0.842760;
pub const SLEEP_CENTER: f64 = 4.5;

/// Cortisol change per hour of exercise above the centre
pub const EXERCISE_COEFFICIENT: f64 = -0.822440;
pub const EXERCISE_CENTER: f64 = 1.0;

/// Cortisol change per unit of event valence
pub const EVENT_COEFFICIENT: f64 = -0.511592;

/// Standard deviation of the label noise
pub const NOISE_SIGMA: f64 = 1.0;

/// Noise-free cortisol for a feature vector
pub fn cortisol_formula(features: &FeatureVector) -> f64 {
    CORTISOL_BIAS
        + SLEEP_COEFFICIENT * (features.sleep_hours - SLEEP_CENTER)
        + EXERCISE_COEFFICIENT * (features.exercise_hours - EXERCISE_CENTER)
        + EVENT_COEFFICIENT * f64::from(features.event_score)
}

/// Seeded generator of synthetic training data
pub struct Synthesizer {
    rng: StdRng,
}

impl Synthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a dataset according to `config`
    pub fn generate(config: &SynthesisConfig) -> Dataset {
        let mut synth = Self::new(config.seed);
        let examples = (0..config.samples).map(|_| synth.next_example()).collect();
        debug!(samples = config.samples, seed = config.seed, "synthesized dataset");
        Dataset::new(examples)
    }

    /// Draw one labeled example
    pub fn next_example(&mut self) -> TrainingExample {
        // Half-open ranges: the upper bound is never drawn
        let sleep_hours = self.rng.gen_range(*SLEEP_RANGE.start()..*SLEEP_RANGE.end());
        let exercise_hours = self
            .rng
            .gen_range(*EXERCISE_RANGE.start()..*EXERCISE_RANGE.end());
        let event_score = self.rng.gen_range(EVENT_RANGE);

        let features = FeatureVector::new(sleep_hours, exercise_hours, event_score);
        let noise = NOISE_SIGMA * self.rng.sample::<f64, _>(StandardNormal);
        let cortisol = (cortisol_formula(&features) + noise).max(0.0);

        TrainingExample { features, cortisol }
    }
}
