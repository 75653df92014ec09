//! Neural Collaborative Filtering
//!
//! Predicts how a user would rate a track from nothing but the two ids.
//!
//! ## Algorithm
//! 1. Label-encode user and track ids (sorted classes)
//! 2. Standardize the `(user_index, item_index)` pairs with `aprender`'s
//!    `StandardScaler`
//! 3. Regress the rating with a ReLU MLP (see [`crate::mlp`])
//! 4. Score a candidate pool by predicted rating, keeping the top `depth`

use crate::encoding::{matrix_rows, to_matrix, LabelEncoder};
use crate::error::{ModelError, Result};
use aprender::preprocessing::StandardScaler;
use aprender::traits::Transformer;
use crate::mlp::{MlpConfig, MlpRegressor, TrainingSummary};
use crate::types::{keep_top, ScoreSource, Scorer, ScoringRequest, SourceScores};
use data_loader::{Interaction, TrackId};
use tracing::{debug, info, instrument, warn};

/// Collaborative scorer backed by a small feed-forward regressor
#[derive(Debug)]
pub struct NeuralCollaborativeFilter {
    config: MlpConfig,
    user_encoder: LabelEncoder,
    item_encoder: LabelEncoder,
    scaler: StandardScaler,
    model: Option<MlpRegressor>,
}

impl NeuralCollaborativeFilter {
    pub fn new() -> Self {
        Self::with_config(MlpConfig::default())
    }

    pub fn with_config(config: MlpConfig) -> Self {
        Self {
            config,
            user_encoder: LabelEncoder::default(),
            item_encoder: LabelEncoder::default(),
            scaler: StandardScaler::new(),
            model: None,
        }
    }

    /// Configure hidden layer widths (default: [128, 64, 32])
    pub fn with_hidden_layers(mut self, hidden_layers: Vec<usize>) -> Self {
        self.config.hidden_layers = hidden_layers;
        self
    }

    /// Configure the maximum number of training epochs (default: 200)
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Fit on the interaction log.
    ///
    /// Interactions are ordered by (user, track) before training so the
    /// result does not depend on how the log was collected.
    #[instrument(skip_all)]
    pub fn fit<'a>(
        &mut self,
        interactions: impl IntoIterator<Item = &'a Interaction>,
    ) -> Result<TrainingSummary> {
        let mut log: Vec<&Interaction> = interactions.into_iter().collect();
        if log.is_empty() {
            return Err(ModelError::InsufficientData {
                model: "NeuralCollaborativeFilter",
                reason: "interaction log is empty".to_string(),
            });
        }
        log.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.track_id.cmp(&b.track_id))
        });

        let user_encoder = LabelEncoder::fit(log.iter().map(|i| i.user_id.as_str()));
        let item_encoder = LabelEncoder::fit(log.iter().map(|i| i.track_id.as_str()));

        let raw: Vec<Vec<f32>> = log
            .iter()
            .filter_map(|i| {
                let user = user_encoder.transform(&i.user_id)?;
                let item = item_encoder.transform(&i.track_id)?;
                Some(vec![user as f32, item as f32])
            })
            .collect();
        let targets: Vec<f32> = log.iter().map(|i| i.rating).collect();

        let mut scaler = StandardScaler::new();
        let inputs = matrix_rows(&scaler.fit_transform(&to_matrix(&raw)?)?);

        info!(
            "Training collaborative model on {} interactions ({} users, {} tracks)",
            inputs.len(),
            user_encoder.len(),
            item_encoder.len()
        );

        let mut model = MlpRegressor::new(self.config.clone());
        let summary = model.fit(&inputs, &targets)?;

        info!(
            epochs = summary.epochs,
            loss = summary.final_loss,
            "Collaborative model trained"
        );

        self.user_encoder = user_encoder;
        self.item_encoder = item_encoder;
        self.scaler = scaler;
        self.model = Some(model);
        Ok(summary)
    }

    /// Predicted rating of `track_id` by `user_id`
    pub fn predict(&self, user_id: &str, track_id: &str) -> Result<f32> {
        let model = self.fitted_model()?;
        let user = self
            .user_encoder
            .transform(user_id)
            .ok_or_else(|| ModelError::UnknownUser(user_id.to_string()))?;
        let item = self
            .item_encoder
            .transform(track_id)
            .ok_or_else(|| ModelError::UnknownItem(track_id.to_string()))?;

        let inputs = self.standardize(&[vec![user as f32, item as f32]])?;
        model.predict(&inputs[0])
    }

    /// Predicted ratings for every known track in `track_ids`, in one
    /// forward pass. Unknown tracks are skipped.
    pub fn predict_many(&self, user_id: &str, track_ids: &[TrackId]) -> Result<Vec<(TrackId, f32)>> {
        let model = self.fitted_model()?;
        let user = self
            .user_encoder
            .transform(user_id)
            .ok_or_else(|| ModelError::UnknownUser(user_id.to_string()))?;

        let known: Vec<(&TrackId, usize)> = track_ids
            .iter()
            .filter_map(|id| self.item_encoder.transform(id).map(|item| (id, item)))
            .collect();
        if known.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Vec<f32>> = known
            .iter()
            .map(|&(_, item)| vec![user as f32, item as f32])
            .collect();
        let predictions = model.predict_batch(&self.standardize(&raw)?)?;

        Ok(known
            .into_iter()
            .map(|(id, _)| id.clone())
            .zip(predictions)
            .collect())
    }

    fn fitted_model(&self) -> Result<&MlpRegressor> {
        self.model.as_ref().ok_or(ModelError::NotFitted {
            model: "NeuralCollaborativeFilter",
        })
    }

    fn standardize(&self, raw: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        Ok(matrix_rows(&self.scaler.transform(&to_matrix(raw)?)?))
    }

    pub fn knows_user(&self, user_id: &str) -> bool {
        self.user_encoder.transform(user_id).is_some()
    }
}

impl Default for NeuralCollaborativeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for NeuralCollaborativeFilter {
    fn source(&self) -> ScoreSource {
        ScoreSource::Collaborative
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    fn score(&self, request: &ScoringRequest) -> SourceScores {
        if !self.is_fitted() || !self.knows_user(&request.user_id) {
            debug!("No collaborative opinion for user {}", request.user_id);
            return SourceScores::new();
        }

        let scored = match self.predict_many(&request.user_id, &request.candidates) {
            Ok(scored) => scored,
            Err(e) => {
                warn!("Collaborative scoring failed for {}: {}", request.user_id, e);
                return SourceScores::new();
            }
        };

        debug!("Collaborative model scored {} candidates", scored.len());
        keep_top(scored, request.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(user: &str, track: &str, rating: f32) -> Interaction {
        Interaction {
            user_id: user.to_string(),
            track_id: track.to_string(),
            rating,
            timestamp: None,
        }
    }

    fn create_test_log() -> Vec<Interaction> {
        let mut log = Vec::new();
        for u in 0..6 {
            for t in 0..5 {
                let rating = if t < 2 { 5.0 } else { 1.0 + (u % 2) as f32 };
                log.push(interaction(&format!("u{u}"), &format!("t{t}"), rating));
            }
        }
        log
    }

    fn small_model() -> NeuralCollaborativeFilter {
        NeuralCollaborativeFilter::new()
            .with_hidden_layers(vec![16, 8])
            .with_max_iter(50)
    }

    #[test]
    fn test_unfitted_model() {
        let model = NeuralCollaborativeFilter::new();
        assert!(!model.is_fitted());
        assert!(matches!(model.predict("u0", "t0"), Err(ModelError::NotFitted { .. })));

        let request = ScoringRequest::new("u0", vec![], vec!["t0".into()], 10);
        assert!(model.score(&request).is_empty());
    }

    #[test]
    fn test_fit_empty_log() {
        let mut model = small_model();
        let empty: Vec<Interaction> = Vec::new();
        assert!(model.fit(&empty).is_err());
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_fit_and_predict() {
        let log = create_test_log();
        let mut model = small_model();
        let summary = model.fit(&log).unwrap();

        assert!(summary.epochs > 0);
        assert!(model.predict("u0", "t0").unwrap().is_finite());
        assert!(matches!(model.predict("ghost", "t0"), Err(ModelError::UnknownUser(_))));
        assert!(matches!(model.predict("u0", "ghost"), Err(ModelError::UnknownItem(_))));
    }

    #[test]
    fn test_score_respects_depth_and_unknowns() {
        let log = create_test_log();
        let mut model = small_model();
        model.fit(&log).unwrap();

        let request = ScoringRequest::new(
            "u1",
            vec![],
            vec!["t0".into(), "t1".into(), "t2".into(), "unseen".into()],
            2,
        );
        let scores = model.score(&request);
        assert_eq!(scores.len(), 2);
        assert!(!scores.contains_key("unseen"));

        let cold = ScoringRequest::new("newcomer", vec![], vec!["t0".into()], 2);
        assert!(model.score(&cold).is_empty());
    }

    #[test]
    fn test_batched_predictions_match_single() {
        let log = create_test_log();
        let mut model = small_model();
        model.fit(&log).unwrap();

        let tracks: Vec<TrackId> = vec!["t0".into(), "ghost".into(), "t3".into()];
        let batched = model.predict_many("u2", &tracks).unwrap();
        assert_eq!(batched.len(), 2);
        for (track, score) in batched {
            assert!((model.predict("u2", &track).unwrap() - score).abs() < 1e-5);
        }
    }

    #[test]
    fn test_log_order_does_not_matter() {
        let log = create_test_log();
        let mut reversed = log.clone();
        reversed.reverse();

        let mut a = small_model();
        let mut b = small_model();
        a.fit(&log).unwrap();
        b.fit(&reversed).unwrap();

        assert_eq!(a.predict("u3", "t4").unwrap(), b.predict("u3", "t4").unwrap());
    }
}
