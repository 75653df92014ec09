//! A small multi-layer perceptron regressor built on `aprender`'s nn stack.
//!
//! ReLU hidden layers, identity output, mean squared error with an L2
//! penalty, trained with minibatch Adam. Early stopping holds out a
//! validation split and watches its R² score.

use crate::error::{ModelError, Result};
use aprender::Vector;
use aprender::autograd::{Tensor, clear_graph, no_grad};
use aprender::metrics::r_squared;
use aprender::nn::loss::MSELoss;
use aprender::nn::optim::Adam;
use aprender::nn::{Linear, Module, Optimizer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Below this many samples there is no validation split
const MIN_SAMPLES_FOR_VALIDATION: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f32,
    /// L2 penalty
    pub alpha: f32,
    pub max_iter: usize,
    pub batch_size: usize,
    pub early_stopping: bool,
    pub validation_fraction: f32,
    pub n_iter_no_change: usize,
    pub tol: f32,
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 64, 32],
            learning_rate: 0.001,
            alpha: 0.001,
            max_iter: 200,
            batch_size: 200,
            early_stopping: true,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub final_loss: f32,
    pub best_validation_score: Option<f32>,
}

#[derive(Debug)]
pub struct MlpRegressor {
    config: MlpConfig,
    layers: Vec<Linear>,
    n_features: usize,
}

impl MlpRegressor {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Train on `x` (one row per sample) against targets `y`.
    ///
    /// Refitting discards any previous weights.
    pub fn fit(&mut self, x: &[Vec<f32>], y: &[f32]) -> Result<TrainingSummary> {
        if x.is_empty() {
            return Err(ModelError::InsufficientData {
                model: "MlpRegressor",
                reason: "no training samples".to_string(),
            });
        }
        if x.len() != y.len() {
            return Err(ModelError::InvalidInput(format!(
                "{} samples but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(ModelError::InvalidInput(
                "samples must share a non-zero feature count".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.n_features = n_features;
        self.layers = self.initialize_layers(n_features);
        clear_graph();

        let mut indices: Vec<usize> = (0..x.len()).collect();
        let use_validation =
            self.config.early_stopping && x.len() >= MIN_SAMPLES_FOR_VALIDATION;
        let (train_idx, val_idx) = if use_validation {
            indices.shuffle(&mut rng);
            let n_val = ((x.len() as f32 * self.config.validation_fraction).ceil() as usize)
                .clamp(1, x.len() - 1);
            let val = indices.split_off(x.len() - n_val);
            (indices, val)
        } else {
            (indices, Vec::new())
        };

        let loss_fn = MSELoss::new();
        let learning_rate = self.config.learning_rate;
        let alpha = self.config.alpha;
        let mut optimizer = Adam::new(self.parameters_mut(), learning_rate).weight_decay(alpha);

        let batch_size = self.config.batch_size.clamp(1, train_idx.len());
        let mut order = train_idx;

        let mut best_loss = f32::INFINITY;
        let mut best_score = f32::NEG_INFINITY;
        let mut best_weights = self.snapshot();
        let mut no_improvement = 0usize;
        let mut loss = 0.0;
        let mut epochs = 0;

        for epoch in 0..self.config.max_iter {
            epochs = epoch + 1;
            order.shuffle(&mut rng);

            let mut accumulated = 0.0;
            for batch in order.chunks(batch_size) {
                let (inputs, targets) = batch_tensors(x, y, batch, n_features);
                let batch_loss = loss_fn.forward(&self.forward(&inputs), &targets);
                accumulated += batch_loss.item() * batch.len() as f32;

                batch_loss.backward();
                {
                    let mut params = self.parameters_mut();
                    optimizer.step_with_params(&mut params);
                }
                optimizer.zero_grad();
                clear_graph();
            }
            loss = accumulated / order.len() as f32;

            if use_validation {
                let score = self.r2_score(x, y, &val_idx);
                if score < best_score + self.config.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                if score > best_score {
                    best_score = score;
                    best_weights = self.snapshot();
                }
            } else {
                if loss > best_loss - self.config.tol {
                    no_improvement += 1;
                } else {
                    no_improvement = 0;
                }
                if loss < best_loss {
                    best_loss = loss;
                }
            }

            if no_improvement > self.config.n_iter_no_change {
                debug!(epoch = epochs, loss, "MLP stopped early");
                break;
            }
        }

        if use_validation {
            self.restore(&best_weights);
        }

        Ok(TrainingSummary {
            epochs,
            final_loss: loss,
            best_validation_score: use_validation.then_some(best_score),
        })
    }

    /// Predict a single sample
    pub fn predict(&self, row: &[f32]) -> Result<f32> {
        let predictions = self.predict_batch(&[row.to_vec()])?;
        Ok(predictions.first().copied().unwrap_or(0.0))
    }

    /// Predict many samples in one forward pass
    pub fn predict_batch(&self, rows: &[Vec<f32>]) -> Result<Vec<f32>> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted {
                model: "MlpRegressor",
            });
        }
        if let Some(row) = rows.iter().find(|row| row.len() != self.n_features) {
            return Err(ModelError::InvalidInput(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.infer(rows))
    }

    fn initialize_layers(&self, n_features: usize) -> Vec<Linear> {
        let mut sizes = vec![n_features];
        sizes.extend(self.config.hidden_layers.iter().copied().filter(|&h| h > 0));
        sizes.push(1);

        sizes
            .windows(2)
            .enumerate()
            .map(|(l, pair)| Linear::with_seed(pair[0], pair[1], Some(self.config.seed + l as u64)))
            .collect()
    }

    fn forward(&self, input: &Tensor) -> Tensor {
        let last = self.layers.len() - 1;
        self.layers
            .iter()
            .enumerate()
            .fold(input.clone(), |x, (l, layer)| {
                let z = layer.forward(&x);
                if l == last { z } else { z.relu() }
            })
    }

    fn infer(&self, rows: &[Vec<f32>]) -> Vec<f32> {
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        let inputs = Tensor::new(&data, &[rows.len(), self.n_features]);
        no_grad(|| self.forward(&inputs)).data().to_vec()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.parameters_mut())
            .collect()
    }

    fn snapshot(&self) -> Vec<Vec<f32>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.parameters())
            .map(|param| param.data().to_vec())
            .collect()
    }

    fn restore(&mut self, weights: &[Vec<f32>]) {
        for (param, saved) in self.parameters_mut().into_iter().zip(weights) {
            param.data_mut().copy_from_slice(saved);
        }
    }

    /// Coefficient of determination over the given samples
    fn r2_score(&self, x: &[Vec<f32>], y: &[f32], indices: &[usize]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        let rows: Vec<Vec<f32>> = indices.iter().map(|&i| x[i].clone()).collect();
        let truth: Vec<f32> = indices.iter().map(|&i| y[i]).collect();
        r_squared(&Vector::from_vec(self.infer(&rows)), &Vector::from_vec(truth))
    }
}

/// `[batch, features]` inputs and `[batch, 1]` targets
fn batch_tensors(x: &[Vec<f32>], y: &[f32], batch: &[usize], n_features: usize) -> (Tensor, Tensor) {
    let inputs: Vec<f32> = batch.iter().flat_map(|&i| x[i].iter().copied()).collect();
    let targets: Vec<f32> = batch.iter().map(|&i| y[i]).collect();
    (
        Tensor::new(&inputs, &[batch.len(), n_features]),
        Tensor::new(&targets, &[batch.len(), 1]),
    )
}
