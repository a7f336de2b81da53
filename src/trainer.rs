//! Offline training orchestration
//!
//! Runs the whole offline path and produces the trained pipeline artifact.
//! Any error aborts the run before anything is written.

use crate::artifact::TrainedPipeline;
use crate::config::{PipelineConfig, TrainingConfig};
use crate::error::TensioError;
use crate::model::{Adam, Gradients, ModelParameters};
use crate::scaler::FeatureScaler;
use crate::synth::Synthesizer;
use crate::types::{Dataset, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Mean squared error over the fit slice, accumulated during the epoch
    pub train_mse: f64,
    pub validation_mse: Option<f64>,
    pub validation_mae: Option<f64>,
}

/// Summary of a training run, embedded in the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_size: usize,
    pub fit_size: usize,
    pub validation_size: usize,
    pub test_size: usize,
    pub epochs: usize,
    /// Held-out test split error
    pub test_mse: f64,
    pub test_mae: f64,
    pub history: Vec<EpochMetrics>,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

/// Result of fitting the regression model
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub model: ModelParameters,
    pub history: Vec<EpochMetrics>,
    pub fit_size: usize,
    pub validation_size: usize,
}

/// Offline trainer: synthesize -> split -> scale -> fit
pub struct Trainer {
    config: PipelineConfig,
}

impl Trainer {
    pub fn new(config: PipelineConfig) -> Result<Self, TensioError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full offline pipeline in memory
    pub fn run(&self) -> Result<TrainedPipeline, TensioError> {
        // Stage 1: synthesize ground truth
        let dataset = Synthesizer::generate(&self.config.synthesis);
        info!(
            samples = dataset.len(),
            seed = self.config.synthesis.seed,
            "synthesized training data"
        );

        self.train_on(&dataset)
    }

    /// Run the full pipeline and persist the artifact at `path`
    pub fn run_and_save(&self, path: &Path) -> Result<TrainedPipeline, TensioError> {
        let pipeline = self.run()?;
        pipeline.save(path)?;
        Ok(pipeline)
    }

    /// Split, scale and fit on an existing dataset
    pub fn train_on(&self, dataset: &Dataset) -> Result<TrainedPipeline, TensioError> {
        let training = &self.config.training;

        // Stage 2: train/test split
        let (train, test) =
            train_test_split(dataset, training.test_fraction, training.split_seed)?;
        info!(train = train.len(), test = test.len(), "split dataset");

        // Stage 3: fit scaler on train features only
        let scaler = FeatureScaler::fit(&train.features())?;
        info!(mean = ?scaler.mean, std = ?scaler.std, "fitted feature scaler");

        // Stage 4: standardize both splits with the same scaler
        let train_x = scaler.transform_all(&train.features());
        let train_y = train.labels();
        let test_x = scaler.transform_all(&test.features());
        let test_y = test.labels();

        // Stage 5: fit the regression model
        let mut outcome = fit_model(&train_x, &train_y, training)?;
        outcome.model.scaler_fingerprint = scaler.fingerprint();

        let (test_mse, test_mae) = outcome.model.evaluate(&test_x, &test_y);
        info!(test_mse, test_mae, "evaluated on held-out test split");

        let report = TrainingReport {
            samples: dataset.len(),
            train_size: train.len(),
            fit_size: outcome.fit_size,
            validation_size: outcome.validation_size,
            test_size: test.len(),
            epochs: training.epochs,
            test_mse,
            test_mae,
            history: outcome.history,
        };

        Ok(TrainedPipeline::new(scaler, outcome.model, report))
    }
}

/// Seeded shuffle, then hold out the last `ceil(n * test_fraction)` rows
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), TensioError> {
    if dataset.len() < 2 {
        return Err(TensioError::EmptyDataset(format!(
            "need at least 2 rows to split, got {}",
            dataset.len()
        )));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TensioError::InvalidConfig(format!(
            "test_fraction must lie in (0, 1), got {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_count =
        ((dataset.len() as f64 * test_fraction).ceil() as usize).clamp(1, dataset.len() - 1);
    let split_at = dataset.len() - test_count;

    Ok((
        dataset.select(&indices[..split_at]),
        dataset.select(&indices[split_at..]),
    ))
}

/// Fit the network on standardized rows for a fixed number of epochs.
///
/// The tail `validation_fraction` of the rows is held out for monitoring only;
/// it never influences which parameters are returned.
pub fn fit_model(
    inputs: &[[f64; FEATURE_COUNT]],
    targets: &[f64],
    config: &TrainingConfig,
) -> Result<FitOutcome, TensioError> {
    config.validate()?;
    if inputs.len() != targets.len() {
        return Err(TensioError::InvalidConfig(format!(
            "{} feature rows but {} labels",
            inputs.len(),
            targets.len()
        )));
    }

    let fit_size = (inputs.len() as f64 * (1.0 - config.validation_fraction)).floor() as usize;
    if fit_size == 0 {
        return Err(TensioError::EmptyDataset(
            "no rows left to fit after validation split".into(),
        ));
    }
    let (fit_x, val_x) = inputs.split_at(fit_size);
    let (fit_y, val_y) = targets.split_at(fit_size);

    let mut model = ModelParameters::initialize(config.init_seed);
    let mut optimizer = Adam::new(config, &model);
    let mut grads = Gradients::zeros_like(&model);
    let mut shuffle_rng = StdRng::seed_from_u64(config.init_seed.wrapping_add(1));
    let mut order: Vec<usize> = (0..fit_size).collect();
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        if config.shuffle {
            order.shuffle(&mut shuffle_rng);
        }

        let mut squared_error = 0.0;
        for batch in order.chunks(config.batch_size) {
            grads.reset();
            let scale = 2.0 / batch.len() as f64;
            for &i in batch {
                squared_error += model.backprop(&fit_x[i], fit_y[i], scale, &mut grads);
            }
            optimizer.step(&mut model, &grads);
        }

        let train_mse = squared_error / fit_size as f64;
        if !train_mse.is_finite() {
            return Err(TensioError::NonFinite(format!(
                "training loss diverged at epoch {epoch}"
            )));
        }

        let (validation_mse, validation_mae) = if val_x.is_empty() {
            (None, None)
        } else {
            let (mse, mae) = model.evaluate(val_x, val_y);
            (Some(mse), Some(mae))
        };

        debug!(epoch, train_mse, ?validation_mse, ?validation_mae, "epoch complete");
        history.push(EpochMetrics {
            epoch,
            train_mse,
            validation_mse,
            validation_mae,
        });
    }

    Ok(FitOutcome {
        model,
        history,
        fit_size,
        validation_size: val_x.len(),
    })
}
