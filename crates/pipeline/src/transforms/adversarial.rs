//! Adversarial popularity debiasing.
//!
//! A logistic-regression detector learns what a popularity-biased listening
//! session looks like. When it judges a recommendation list biased, the
//! most popular entries are flagged and their scores cut.
//!
//! ## Session features
//! `[mean, std, min, max]` of track popularity, number of distinct genres,
//! and artist uniqueness (`distinct artists / tracks`). A training session
//! is labelled biased when its mean popularity exceeds 75 or its artist
//! uniqueness is below 0.7.

use crate::traits::{Transform, TransformContext};
use anyhow::{anyhow, bail, Result};
use aprender::Matrix;
use aprender::classification::LogisticRegression;
use aprender::preprocessing::StandardScaler;
use aprender::traits::Transformer;
use data_loader::{sort_by_score, Catalog, Recommendation, TrackId};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

pub const DEFAULT_BIAS_THRESHOLD: f32 = 0.7;
const CORRECTION_FRACTION: f32 = 0.3;
const CORRECTION_FACTOR: f32 = 0.7;

const FEATURES: usize = 6;
const BIASED_MEAN_POPULARITY: f32 = 75.0;
const MIN_ARTIST_UNIQUENESS: f32 = 0.7;

/// `[mean, std, min, max]` popularity, genre count, artist uniqueness
pub type SessionFeatures = [f32; FEATURES];

/// Features of a session; `None` when none of its tracks are known
pub fn session_features(track_ids: &[TrackId], catalog: &Catalog) -> Option<SessionFeatures> {
    let tracks: Vec<_> = track_ids.iter().filter_map(|id| catalog.get_track(id)).collect();
    if tracks.is_empty() {
        return None;
    }

    let pops: Vec<f32> = tracks.iter().map(|t| t.popularity as f32).collect();
    let n = pops.len() as f32;
    let mean = pops.iter().sum::<f32>() / n;
    let std = (pops.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / n).sqrt();
    let min = pops.iter().copied().fold(f32::INFINITY, f32::min);
    let max = pops.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let genres: HashSet<&str> = tracks
        .iter()
        .flat_map(|t| t.genres.iter().map(String::as_str))
        .collect();
    let artists: HashSet<&str> = tracks.iter().map(|t| t.artist_id.as_str()).collect();

    Some([mean, std, min, max, genres.len() as f32, artists.len() as f32 / n])
}

fn is_biased(features: &SessionFeatures) -> bool {
    features[0] > BIASED_MEAN_POPULARITY || features[5] < MIN_ARTIST_UNIQUENESS
}

/// Logistic regression over standardized session features
#[derive(Debug, Clone)]
pub struct BiasDetector {
    scaler: StandardScaler,
    model: LogisticRegression,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DetectorSummary {
    pub sessions: usize,
    pub biased: usize,
    /// Share of training sessions the detector labels correctly
    pub training_accuracy: f32,
}

impl BiasDetector {
    const LEARNING_RATE: f32 = 0.1;
    const MAX_ITER: usize = 1000;
    const TOLERANCE: f32 = 1e-4;

    /// Full-batch gradient descent on the log loss
    fn fit(samples: &[SessionFeatures], labels: &[usize]) -> Result<(Self, f32)> {
        let mut scaler = StandardScaler::new();
        let standardized = scaler.fit_transform(&feature_matrix(samples)?)?;

        let mut model = LogisticRegression::new()
            .with_learning_rate(Self::LEARNING_RATE)
            .with_max_iter(Self::MAX_ITER)
            .with_tolerance(Self::TOLERANCE);
        model.fit(&standardized, labels)?;
        let accuracy = model.score(&standardized, labels);

        Ok((Self { scaler, model }, accuracy))
    }

    /// Probability that a session with these raw features is biased
    pub fn predict_proba(&self, features: &SessionFeatures) -> Result<f32> {
        let standardized = self.scaler.transform(&feature_matrix(&[*features])?)?;
        Ok(self.model.predict_proba(&standardized)[0])
    }
}

fn feature_matrix(samples: &[SessionFeatures]) -> Result<Matrix<f32>> {
    let data: Vec<f32> = samples.iter().flatten().copied().collect();
    Matrix::from_vec(samples.len(), FEATURES, data).map_err(|e| anyhow!(e))
}

#[derive(Debug, Clone)]
pub struct AdversarialDebiaser {
    threshold: f32,
    detector: Option<BiasDetector>,
}

impl Default for AdversarialDebiaser {
    fn default() -> Self {
        Self::new()
    }
}

impl AdversarialDebiaser {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_BIAS_THRESHOLD,
            detector: None,
        }
    }

    /// Probability above which a list counts as biased (default: 0.7)
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.detector.is_some()
    }

    /// Train the detector on listening sessions.
    ///
    /// Sessions with no known tracks are skipped; it is an error if none
    /// remain.
    #[instrument(skip_all, fields(sessions = sessions.len()))]
    pub fn train(&mut self, sessions: &[Vec<TrackId>], catalog: &Catalog) -> Result<DetectorSummary> {
        let samples: Vec<SessionFeatures> = sessions
            .par_iter()
            .filter_map(|session| session_features(session, catalog))
            .collect();
        if samples.is_empty() {
            bail!("no usable sessions to train the bias detector on");
        }

        let labels: Vec<usize> = samples.iter().map(|s| usize::from(is_biased(s))).collect();
        let biased = labels.iter().filter(|&&l| l == 1).count();

        let (detector, training_accuracy) = BiasDetector::fit(&samples, &labels)?;
        self.detector = Some(detector);

        info!(
            "Bias detector trained on {} sessions ({} biased), accuracy {:.2}",
            samples.len(),
            biased,
            training_accuracy
        );
        Ok(DetectorSummary {
            sessions: samples.len(),
            biased,
            training_accuracy,
        })
    }

    /// Train on every listener's history, one session per user
    pub fn train_on_histories(&mut self, catalog: &Catalog) -> Result<DetectorSummary> {
        let sessions: Vec<Vec<TrackId>> = catalog
            .user_ids()
            .iter()
            .map(|user| {
                catalog
                    .get_user_interactions(user)
                    .iter()
                    .map(|i| i.track_id.clone())
                    .collect()
            })
            .collect();
        self.train(&sessions, catalog)
    }

    /// Bias probability of a list; `None` if untrained or no track is known
    pub fn bias_probability(&self, recommendations: &[Recommendation], catalog: &Catalog) -> Option<f32> {
        let detector = self.detector.as_ref()?;
        let ids: Vec<TrackId> = recommendations.iter().map(|r| r.track_id.clone()).collect();
        session_features(&ids, catalog).and_then(|f| detector.predict_proba(&f).ok())
    }
}

impl Transform for AdversarialDebiaser {
    fn name(&self) -> &str {
        "AdversarialDebiaser"
    }

    #[instrument(skip_all, fields(count = recommendations.len()))]
    fn apply(
        &self,
        mut recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        let Some(probability) = self.bias_probability(&recommendations, context.catalog) else {
            return Ok(recommendations);
        };
        debug!("Bias probability {:.3}", probability);
        if probability <= self.threshold {
            return Ok(recommendations);
        }

        let mut by_popularity: Vec<(usize, u8)> = recommendations
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let popularity = context
                    .catalog
                    .get_track(&r.track_id)
                    .map(|t| t.popularity)
                    .unwrap_or(0);
                (i, popularity)
            })
            .collect();
        by_popularity.sort_by(|a, b| b.1.cmp(&a.1));

        let to_correct = (recommendations.len() as f32 * CORRECTION_FRACTION).floor() as usize;
        for &(i, _) in by_popularity.iter().take(to_correct) {
            let rec = &mut recommendations[i];
            rec.provenance.original_score.get_or_insert(rec.score);
            rec.provenance.needs_bias_correction = true;
            rec.score *= CORRECTION_FACTOR;
        }

        sort_by_score(&mut recommendations);
        Ok(recommendations)
    }
}
