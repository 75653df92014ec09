//! Content-based similarity over audio features.
//!
//! "Tracks that sound like the ones you liked."
//!
//! ## Algorithm
//! 1. Normalize every track's audio features to [0,1]
//! 2. Precompute the full item-item similarity matrix (rows in parallel)
//! 3. Score a candidate by its summed similarity to the liked tracks
//!
//! Tracks without audio analysis are left out of the matrix, so the
//! scorer has no opinion on them.

use crate::error::{ModelError, Result};
use crate::types::{keep_top, ScoreSource, Scorer, ScoringRequest, SourceScores};
use data_loader::{
    audio_similarity, cosine_similarity, euclidean_similarity, track_features, AudioWeights,
    NormalizedFeatures, Track, TrackId,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    /// `1 / (1 + euclidean distance)`
    Euclidean,
    /// Per-attribute weighted closeness, see [`data_loader::audio_similarity`]
    WeightedAudio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSimilarity {
    metric: SimilarityMetric,
    weights: AudioWeights,
    item_ids: Vec<TrackId>,
    /// Row-major `n x n`
    matrix: Vec<f32>,
    #[serde(skip)]
    positions: HashMap<TrackId, usize>,
}

impl ContentSimilarity {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            weights: AudioWeights::default(),
            item_ids: Vec::new(),
            matrix: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Weights used by [`SimilarityMetric::WeightedAudio`]
    pub fn with_weights(mut self, weights: AudioWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Build the similarity matrix from every track with audio analysis
    #[instrument(skip_all, fields(metric = ?self.metric))]
    pub fn fit<'a>(&mut self, tracks: impl IntoIterator<Item = &'a Track>) -> Result<()> {
        let mut items: Vec<(TrackId, NormalizedFeatures)> = tracks
            .into_iter()
            .filter_map(|t| track_features(t).map(|f| (t.id.clone(), f)))
            .collect();
        if items.is_empty() {
            return Err(ModelError::InsufficientData {
                model: "ContentSimilarity",
                reason: "no tracks with audio features".to_string(),
            });
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items.dedup_by(|a, b| a.0 == b.0);

        let n = items.len();
        let metric = self.metric;
        let weights = self.weights;
        let mut matrix = vec![0.0f32; n * n];

        matrix.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            let a = &items[i].1;
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = pair_similarity(metric, &weights, a, &items[j].1);
            }
        });

        self.item_ids = items.into_iter().map(|(id, _)| id).collect();
        self.matrix = matrix;
        self.rebuild_positions();

        info!("Built {}x{} content similarity matrix", n, n);
        Ok(())
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .item_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
    }

    /// Similarity between two tracks, if both are in the matrix
    pub fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let i = *self.positions.get(a)?;
        let j = *self.positions.get(b)?;
        Some(self.matrix[i * self.item_ids.len() + j])
    }

    fn row(&self, i: usize) -> &[f32] {
        let n = self.item_ids.len();
        &self.matrix[i * n..(i + 1) * n]
    }

    /// The `n` most similar tracks, excluding the track itself
    pub fn similar_items(&self, track_id: &str, n: usize) -> Result<Vec<(TrackId, f32)>> {
        if self.is_empty() {
            return Err(ModelError::NotFitted {
                model: "ContentSimilarity",
            });
        }
        let i = *self
            .positions
            .get(track_id)
            .ok_or_else(|| ModelError::UnknownItem(track_id.to_string()))?;

        let mut similar: Vec<(TrackId, f32)> = self
            .row(i)
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(j, &s)| (self.item_ids[j].clone(), s))
            .collect();
        similar.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        similar.truncate(n);
        Ok(similar)
    }

    /// Aggregate each liked track's `2n` nearest neighbours and return the
    /// `n` tracks with the highest summed similarity. Liked tracks are
    /// never returned; unknown liked tracks are skipped.
    pub fn recommend_for_user(&self, liked: &[TrackId], n: usize) -> Vec<(TrackId, f32)> {
        let liked_set: HashSet<&str> = liked.iter().map(String::as_str).collect();
        let mut totals: HashMap<TrackId, f32> = HashMap::new();

        for track_id in liked {
            let Ok(neighbours) = self.similar_items(track_id, n * 2) else {
                continue;
            };
            for (id, similarity) in neighbours {
                if !liked_set.contains(id.as_str()) {
                    *totals.entry(id).or_insert(0.0) += similarity;
                }
            }
        }

        let mut ranked: Vec<(TrackId, f32)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut model: Self = serde_json::from_reader(reader)?;
        let n = model.item_ids.len();
        if model.matrix.len() != n * n {
            return Err(ModelError::InvalidInput(format!(
                "similarity matrix has {} cells for {} items",
                model.matrix.len(),
                n
            )));
        }
        model.rebuild_positions();
        Ok(model)
    }
}

impl Default for ContentSimilarity {
    fn default() -> Self {
        Self::new(SimilarityMetric::Cosine)
    }
}

fn pair_similarity(
    metric: SimilarityMetric,
    weights: &AudioWeights,
    a: &NormalizedFeatures,
    b: &NormalizedFeatures,
) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(&a.vector(), &b.vector()),
        SimilarityMetric::Euclidean => euclidean_similarity(&a.vector(), &b.vector()),
        SimilarityMetric::WeightedAudio => audio_similarity(a, b, weights),
    }
}

impl Scorer for ContentSimilarity {
    fn source(&self) -> ScoreSource {
        ScoreSource::Content
    }

    fn is_fitted(&self) -> bool {
        !self.is_empty()
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    fn score(&self, request: &ScoringRequest) -> SourceScores {
        let liked: Vec<usize> = request
            .liked
            .iter()
            .filter_map(|id| self.positions.get(id).copied())
            .collect();
        if liked.is_empty() {
            debug!("No liked tracks with audio features, no content opinion");
            return SourceScores::new();
        }
        let liked_ids: HashSet<&str> = request.liked.iter().map(String::as_str).collect();

        let scored: Vec<(TrackId, f32)> = request
            .candidates
            .iter()
            .filter(|id| !liked_ids.contains(id.as_str()))
            .filter_map(|id| {
                let j = *self.positions.get(id)?;
                let total: f32 = liked.iter().map(|&i| self.row(i)[j]).sum();
                Some((id.clone(), total))
            })
            .collect();

        keep_top(scored, request.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::AudioFeatures;

    fn track(id: &str, danceability: f32, energy: f32, acousticness: f32) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            artist_id: "a".to_string(),
            artist_name: String::new(),
            popularity: 50,
            release_date: None,
            genres: Default::default(),
            audio: Some(AudioFeatures {
                danceability,
                energy,
                valence: 0.5,
                acousticness,
                instrumentalness: 0.0,
                speechiness: 0.0,
                liveness: 0.0,
                tempo: 120.0,
                loudness: -8.0,
            }),
            duration_ms: None,
        }
    }

    fn create_test_tracks() -> Vec<Track> {
        let mut silent = track("silent", 0.0, 0.0, 0.0);
        silent.audio = None;
        vec![
            track("club1", 0.9, 0.9, 0.05),
            track("club2", 0.85, 0.95, 0.1),
            track("club3", 0.8, 0.85, 0.05),
            track("folk1", 0.2, 0.2, 0.95),
            track("folk2", 0.25, 0.15, 0.9),
            silent,
        ]
    }

    fn fitted(metric: SimilarityMetric) -> ContentSimilarity {
        let mut model = ContentSimilarity::new(metric);
        model.fit(&create_test_tracks()).unwrap();
        model
    }

    #[test]
    fn test_tracks_without_audio_are_skipped() {
        let model = fitted(SimilarityMetric::Cosine);
        assert_eq!(model.len(), 5);
        assert!(model.similarity("silent", "club1").is_none());
    }

    #[test]
    fn test_fit_without_audio_fails() {
        let mut model = ContentSimilarity::default();
        let mut bare = track("x", 0.0, 0.0, 0.0);
        bare.audio = None;
        assert!(model.fit(&[bare]).is_err());
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_similar_items_excludes_self() {
        for metric in [
            SimilarityMetric::Cosine,
            SimilarityMetric::Euclidean,
            SimilarityMetric::WeightedAudio,
        ] {
            let model = fitted(metric);
            let similar = model.similar_items("club1", 2).unwrap();
            assert_eq!(similar.len(), 2);
            assert!(similar.iter().all(|(id, _)| id != "club1"));
            assert!(similar.iter().all(|(id, _)| id.starts_with("club")), "{metric:?}");
            assert!(similar[0].1 >= similar[1].1);
        }
    }

    #[test]
    fn test_similar_items_unknown_track() {
        let model = fitted(SimilarityMetric::Cosine);
        assert!(matches!(
            model.similar_items("nope", 3),
            Err(ModelError::UnknownItem(_))
        ));
    }

    #[test]
    fn test_recommend_for_user_excludes_liked() {
        let model = fitted(SimilarityMetric::WeightedAudio);
        let liked = vec!["club1".to_string(), "club2".to_string()];
        let recs = model.recommend_for_user(&liked, 2);

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].0, "club3");
        assert!(recs.iter().all(|(id, _)| !liked.contains(id)));
    }

    #[test]
    fn test_score_candidate_pool() {
        let model = fitted(SimilarityMetric::WeightedAudio);
        let request = ScoringRequest::new(
            "u1",
            vec!["folk1".into()],
            vec!["club1".into(), "folk2".into(), "folk1".into(), "silent".into()],
            10,
        );
        let scores = model.score(&request);

        assert_eq!(scores.len(), 2);
        assert!(scores["folk2"] > scores["club1"]);
        assert!(!scores.contains_key("folk1"));
    }

    #[test]
    fn test_no_liked_tracks_means_no_opinion() {
        let model = fitted(SimilarityMetric::Cosine);
        let request = ScoringRequest::new("u1", vec![], vec!["club1".into()], 10);
        assert!(model.score(&request).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let model = fitted(SimilarityMetric::Euclidean);
        let file = tempfile::NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();

        let restored = ContentSimilarity::load(file.path()).unwrap();
        assert_eq!(restored.metric(), SimilarityMetric::Euclidean);
        assert_eq!(
            restored.similarity("club1", "folk1"),
            model.similarity("club1", "folk1")
        );
    }
}
