//! Hybrid score blending.
//!
//! Every candidate in the pool gets
//!
//! ```text
//! score = w_cf * cf + w_content * content + w_pop * popularity
//!       + w_div * boost * profile.distance_to(track)
//! ```
//!
//! A source with no opinion on a candidate contributes 0. The diversity
//! term only applies when a boost above zero and a listener profile are
//! both present.

use data_loader::{sort_by_score, Catalog, Provenance, Recommendation, TrackId, UserProfile};
use serde::{Deserialize, Serialize};
use sources::{ScoreSource, Scorer, ScoringRequest, SourceScores};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Per-source blend weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub collaborative: f32,
    pub content: f32,
    pub popularity: f32,
    pub diversity: f32,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.4,
            content: 0.3,
            popularity: 0.1,
            diversity: 0.2,
        }
    }
}

impl BlendWeights {
    pub fn weight(&self, source: ScoreSource) -> f32 {
        match source {
            ScoreSource::Collaborative => self.collaborative,
            ScoreSource::Content => self.content,
            ScoreSource::Popularity => self.popularity,
        }
    }
}

/// Pushes the blend toward tracks unlike the listener's history
#[derive(Debug, Clone, Copy)]
pub struct DiversityAdjustment<'a> {
    pub profile: &'a UserProfile,
    pub catalog: &'a Catalog,
    /// Scales the diversity weight, typically in [0,1]
    pub boost: f32,
}

#[derive(Debug, Clone, Default)]
pub struct HybridBlender {
    weights: BlendWeights,
}

impl HybridBlender {
    pub fn new(weights: BlendWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &BlendWeights {
        &self.weights
    }

    /// Blend every candidate in `pool` and return them all, best first.
    ///
    /// Duplicate pool entries are dropped (first occurrence wins). Ties
    /// keep pool order.
    #[instrument(skip_all, fields(pool = pool.len()))]
    pub fn blend_all(
        &self,
        pool: &[TrackId],
        source_scores: &[(ScoreSource, SourceScores)],
        adjustment: Option<&DiversityAdjustment<'_>>,
    ) -> Vec<Recommendation> {
        let adjustment = adjustment.filter(|a| a.boost > 0.0);
        let mut seen: HashSet<&str> = HashSet::with_capacity(pool.len());

        let mut blended: Vec<Recommendation> = pool
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| {
                let mut provenance = Provenance::default();
                for (source, scores) in source_scores {
                    let raw = scores.get(id).copied().filter(|s| s.is_finite()).unwrap_or(0.0);
                    let contribution = self.weights.weight(*source) * raw;
                    match source {
                        ScoreSource::Collaborative => provenance.collaborative += contribution,
                        ScoreSource::Content => provenance.content += contribution,
                        ScoreSource::Popularity => provenance.popularity += contribution,
                    }
                }

                if let Some(adj) = adjustment {
                    if let Some(track) = adj.catalog.get_track(id) {
                        provenance.diversity =
                            self.weights.diversity * adj.boost * adj.profile.distance_to(track);
                    }
                }

                let score = provenance.collaborative
                    + provenance.content
                    + provenance.popularity
                    + provenance.diversity;
                Recommendation {
                    track_id: id.clone(),
                    score,
                    provenance,
                }
            })
            .collect();

        sort_by_score(&mut blended);
        debug!("Blended {} candidates", blended.len());
        blended
    }

    /// Blend and keep the top `n`
    pub fn blend(
        &self,
        pool: &[TrackId],
        source_scores: &[(ScoreSource, SourceScores)],
        adjustment: Option<&DiversityAdjustment<'_>>,
        n: usize,
    ) -> Vec<Recommendation> {
        let mut blended = self.blend_all(pool, source_scores, adjustment);
        blended.truncate(n);
        blended
    }

    /// Query each scorer in turn with a depth of `2n`, then blend.
    ///
    /// The orchestrator runs the scorers concurrently and calls
    /// [`HybridBlender::blend_all`] directly; this is the synchronous path.
    pub fn recommend(
        &self,
        scorers: &[&dyn Scorer],
        user_id: &str,
        liked: &[TrackId],
        pool: &[TrackId],
        adjustment: Option<&DiversityAdjustment<'_>>,
        n: usize,
    ) -> Vec<Recommendation> {
        if n == 0 {
            return Vec::new();
        }
        let request = ScoringRequest::new(user_id, liked.to_vec(), pool.to_vec(), n * 2);
        let source_scores: Vec<(ScoreSource, SourceScores)> = scorers
            .iter()
            .map(|scorer| (scorer.source(), scorer.score(&request)))
            .collect();
        self.blend(&request.candidates, &source_scores, adjustment, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_catalog, ids, listener_profile};

    fn scores(entries: &[(&str, f32)]) -> SourceScores {
        entries.iter().map(|&(id, s)| (id.to_string(), s)).collect()
    }

    fn pool(ids: &[&str]) -> Vec<TrackId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    struct Fixed(ScoreSource, SourceScores);

    impl Scorer for Fixed {
        fn source(&self) -> ScoreSource {
            self.0
        }

        fn is_fitted(&self) -> bool {
            true
        }

        fn score(&self, request: &ScoringRequest) -> SourceScores {
            self.1
                .iter()
                .filter(|(id, _)| request.candidates.contains(id))
                .map(|(id, s)| (id.clone(), *s))
                .collect()
        }
    }

    #[test]
    fn test_weighted_sum() {
        let blender = HybridBlender::default();
        let sources = vec![
            (ScoreSource::Collaborative, scores(&[("a", 1.0), ("b", 0.5)])),
            (ScoreSource::Content, scores(&[("b", 1.0)])),
            (ScoreSource::Popularity, scores(&[("c", 1.0)])),
        ];

        let out = blender.blend_all(&pool(&["a", "b", "c"]), &sources, None);
        assert_eq!(ids(&out), vec!["b", "a", "c"]);
        assert!((out[0].score - (0.4 * 0.5 + 0.3)).abs() < 1e-6);
        assert!((out[1].score - 0.4).abs() < 1e-6);
        assert!((out[2].score - 0.1).abs() < 1e-6);
        assert!((out[0].provenance.content - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_missing_scores_count_as_zero() {
        let blender = HybridBlender::default();
        let out = blender.blend_all(&pool(&["x", "y"]), &[], None);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.score == 0.0));
        // Ties keep pool order
        assert_eq!(ids(&out), vec!["x", "y"]);
    }

    #[test]
    fn test_duplicates_dropped_and_truncated() {
        let blender = HybridBlender::default();
        let sources = vec![(ScoreSource::Popularity, scores(&[("a", 1.0), ("b", 2.0)]))];
        let out = blender.blend(&pool(&["a", "b", "a", "c"]), &sources, None, 2);
        assert_eq!(ids(&out), vec!["b", "a"]);
    }

    #[test]
    fn test_diversity_adjustment_needs_boost() {
        let catalog = create_test_catalog();
        let profile = listener_profile(&catalog);
        let blender = HybridBlender::default();
        let tracks = pool(&["hit1", "deep2"]);

        let off = DiversityAdjustment {
            profile: &profile,
            catalog: &catalog,
            boost: 0.0,
        };
        let out = blender.blend_all(&tracks, &[], Some(&off));
        assert!(out.iter().all(|r| r.provenance.diversity == 0.0));

        let on = DiversityAdjustment { boost: 1.0, ..off };
        let out = blender.blend_all(&tracks, &[], Some(&on));
        // The niche ambient track is far from a pop listener
        assert_eq!(out[0].track_id, "deep2");
        assert!(out[0].provenance.diversity > out[1].provenance.diversity);
    }

    #[test]
    fn test_output_sorted_descending() {
        let blender = HybridBlender::new(BlendWeights {
            collaborative: 1.0,
            content: 0.5,
            popularity: 0.25,
            diversity: 0.0,
        });
        let sources = vec![
            (ScoreSource::Collaborative, scores(&[("a", 0.1), ("b", 0.9), ("c", 0.4)])),
            (ScoreSource::Content, scores(&[("a", 0.8), ("d", 0.3)])),
        ];
        let out = blender.blend_all(&pool(&["a", "b", "c", "d"]), &sources, None);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_recommend_queries_scorers() {
        let blender = HybridBlender::default();
        let cf = Fixed(ScoreSource::Collaborative, scores(&[("a", 1.0), ("z", 9.0)]));
        let content = Fixed(ScoreSource::Content, scores(&[("b", 2.0)]));
        let scorers: Vec<&dyn Scorer> = vec![&cf, &content];

        let out = blender.recommend(&scorers, "u", &[], &pool(&["a", "b"]), None, 1);
        assert_eq!(ids(&out), vec!["b"]);
        assert!(blender.recommend(&scorers, "u", &[], &pool(&["a"]), None, 0).is_empty());
    }
}
