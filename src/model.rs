//! Regression model
//!
//! A 3 -> 16 -> 8 -> 1 feed-forward network with ReLU hidden layers and an
//! identity output, trained on mean-squared error with Adam.
//!
//! The forward pass is pure and allocation-light; training support
//! (backpropagation and the optimizer) lives alongside it so the parameter
//! layout is defined in one place.

use crate::config::TrainingConfig;
use crate::error::TensioError;
use crate::types::FEATURE_COUNT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Layer widths from input to output
pub const LAYER_SIZES: [usize; 4] = [FEATURE_COUNT, 16, 8, 1];

/// Anything that maps one standardized feature row to a raw cortisol value
pub trait CortisolPredictor: Send + Sync {
    /// Raw, unclamped cortisol estimate
    fn predict_raw(&self, standardized: &[f64; FEATURE_COUNT]) -> f64;
}

/// Layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Identity,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation
    fn derivative(self, pre: f64) -> f64 {
        match self {
            Activation::Relu => {
                if pre > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

/// Fully connected layer; `weights[o][i]` connects input `i` to output `o`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero biases
    fn glorot(inputs: usize, outputs: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();

        Self {
            weights,
            biases: vec![0.0; outputs],
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn outputs(&self) -> usize {
        self.biases.len()
    }

    /// Pre-activation values for `input`
    fn pre_activation(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// Trained network parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub layers: Vec<DenseLayer>,
    /// Fingerprint of the scaler these parameters were trained against
    #[serde(default)]
    pub scaler_fingerprint: String,
}

impl ModelParameters {
    /// Fresh, untrained parameters for the fixed topology
    pub fn initialize(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let last = LAYER_SIZES.len() - 2;

        let layers = LAYER_SIZES
            .windows(2)
            .enumerate()
            .map(|(idx, pair)| {
                let activation = if idx == last {
                    Activation::Identity
                } else {
                    Activation::Relu
                };
                DenseLayer::glorot(pair[0], pair[1], activation, &mut rng)
            })
            .collect();

        Self {
            layers,
            scaler_fingerprint: String::new(),
        }
    }

    /// Layer widths, input first
    pub fn topology(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        if let Some(first) = self.layers.first() {
            sizes.push(first.inputs());
        }
        sizes.extend(self.layers.iter().map(DenseLayer::outputs));
        sizes
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.inputs() * l.outputs() + l.outputs())
            .sum()
    }

    /// Check shape, activations and finiteness against the fixed topology
    pub fn validate(&self) -> Result<(), TensioError> {
        let topology = self.topology();
        if topology != LAYER_SIZES {
            return Err(TensioError::IncompatibleArtifact(format!(
                "expected topology {:?}, found {:?}",
                LAYER_SIZES, topology
            )));
        }

        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let expected = if idx == last {
                Activation::Identity
            } else {
                Activation::Relu
            };
            if layer.activation != expected {
                return Err(TensioError::IncompatibleArtifact(format!(
                    "layer {idx} has activation {:?}, expected {:?}",
                    layer.activation, expected
                )));
            }
            let (inputs, outputs) = (LAYER_SIZES[idx], LAYER_SIZES[idx + 1]);
            if layer.outputs() != outputs
                || layer.weights.len() != outputs
                || layer.weights.iter().any(|row| row.len() != inputs)
            {
                return Err(TensioError::IncompatibleArtifact(format!(
                    "layer {idx} weights are not {outputs}x{inputs}"
                )));
            }
            let all_finite = layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.biases)
                .all(|v| v.is_finite());
            if !all_finite {
                return Err(TensioError::IncompatibleArtifact(format!(
                    "layer {idx} contains non-finite parameters"
                )));
            }
        }
        Ok(())
    }

    /// Forward pass: raw cortisol for one standardized row
    pub fn predict(&self, input: &[f64; FEATURE_COUNT]) -> f64 {
        let mut activations = input.to_vec();
        for layer in &self.layers {
            activations = layer
                .pre_activation(&activations)
                .into_iter()
                .map(|z| layer.activation.apply(z))
                .collect();
        }
        activations.first().copied().unwrap_or(0.0)
    }

    /// Mean-squared and mean-absolute error over a set of rows
    pub fn evaluate(&self, inputs: &[[f64; FEATURE_COUNT]], targets: &[f64]) -> (f64, f64) {
        if inputs.is_empty() {
            return (0.0, 0.0);
        }
        let (sq, abs) = inputs
            .iter()
            .zip(targets)
            .fold((0.0, 0.0), |(sq, abs), (x, y)| {
                let err = self.predict(x) - y;
                (sq + err * err, abs + err.abs())
            });
        let n = inputs.len() as f64;
        (sq / n, abs / n)
    }

    /// Accumulate MSE gradients for one sample into `grads`.
    ///
    /// `scale` multiplies dL/dy (2 / batch size for a mean over the batch).
    /// Returns the squared error of the sample.
    pub fn backprop(
        &self,
        input: &[f64; FEATURE_COUNT],
        target: f64,
        scale: f64,
        grads: &mut Gradients,
    ) -> f64 {
        // activations[0] is the input; pre[l] feeds activations[l + 1]
        let mut activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len() + 1);
        let mut pre: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        activations.push(input.to_vec());

        for layer in &self.layers {
            let z = layer.pre_activation(&activations[activations.len() - 1]);
            activations.push(z.iter().map(|&v| layer.activation.apply(v)).collect());
            pre.push(z);
        }

        let output = activations[self.layers.len()][0];
        let err = output - target;

        let mut delta: Vec<f64> = pre[self.layers.len() - 1]
            .iter()
            .map(|&z| scale * err * self.layers[self.layers.len() - 1].activation.derivative(z))
            .collect();

        for l in (0..self.layers.len()).rev() {
            let layer = &self.layers[l];
            let grad = &mut grads.layers[l];
            let input_act = &activations[l];

            for (o, d) in delta.iter().enumerate() {
                grad.biases[o] += d;
                for (g, x) in grad.weights[o].iter_mut().zip(input_act) {
                    *g += d * x;
                }
            }

            if l > 0 {
                let below = &self.layers[l - 1];
                delta = (0..layer.inputs())
                    .map(|i| {
                        let back: f64 = layer
                            .weights
                            .iter()
                            .zip(&delta)
                            .map(|(row, d)| row[i] * d)
                            .sum();
                        back * below.activation.derivative(pre[l - 1][i])
                    })
                    .collect();
            }
        }

        err * err
    }

    /// Load model parameters from JSON
    pub fn from_json(json: &str) -> Result<Self, TensioError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize model parameters to JSON
    pub fn to_json(&self) -> Result<String, TensioError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl CortisolPredictor for ModelParameters {
    fn predict_raw(&self, standardized: &[f64; FEATURE_COUNT]) -> f64 {
        self.predict(standardized)
    }
}

/// Per-layer gradient buffer shaped like `DenseLayer`
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGradient {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

/// Gradient (or optimizer moment) buffers for a whole model
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<LayerGradient>,
}

impl Gradients {
    pub fn zeros_like(params: &ModelParameters) -> Self {
        Self {
            layers: params
                .layers
                .iter()
                .map(|l| LayerGradient {
                    weights: vec![vec![0.0; l.inputs()]; l.outputs()],
                    biases: vec![0.0; l.outputs()],
                })
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.weights.iter_mut().flatten().for_each(|g| *g = 0.0);
            layer.biases.iter_mut().for_each(|g| *g = 0.0);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &f64> {
        self.layers
            .iter()
            .flat_map(|l| l.weights.iter().flatten().chain(&l.biases))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.layers
            .iter_mut()
            .flat_map(|l| l.weights.iter_mut().flatten().chain(l.biases.iter_mut()))
    }
}

fn params_iter_mut(params: &mut ModelParameters) -> impl Iterator<Item = &mut f64> {
    params
        .layers
        .iter_mut()
        .flat_map(|l| l.weights.iter_mut().flatten().chain(l.biases.iter_mut()))
}

/// Adam optimizer with bias correction
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    pub fn new(config: &TrainingConfig, params: &ModelParameters) -> Self {
        Self {
            learning_rate: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
            step: 0,
            m: Gradients::zeros_like(params),
            v: Gradients::zeros_like(params),
        }
    }

    /// Apply one update from `grads` to `params`
    pub fn step(&mut self, params: &mut ModelParameters, grads: &Gradients) {
        self.step = self.step.saturating_add(1);
        let correction = (1.0 - self.beta2.powi(self.step)).sqrt() / (1.0 - self.beta1.powi(self.step));
        let lr_t = self.learning_rate * correction;

        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let moments = self.m.iter_mut().zip(self.v.iter_mut());

        for ((p, g), (m, v)) in params_iter_mut(params).zip(grads.iter()).zip(moments) {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + eps);
        }
    }
}
