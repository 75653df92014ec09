//! Report types produced by the evaluator.
//!
//! Everything serializes with serde so a report can be written straight to
//! JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub ndcg: f32,
    pub true_positives: usize,
    pub recommended_count: usize,
    pub ground_truth_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreDiversity {
    pub unique_genres: usize,
    pub genre_entropy: f32,
    /// Entropy over its maximum, 0 with fewer than two genres
    pub genre_balance: f32,
    pub genre_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistDiversity {
    pub unique_artists: usize,
    pub total_tracks: usize,
    pub artist_diversity_ratio: f32,
    pub artist_concentration_gini: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularityDiversity {
    pub mean_popularity: f32,
    pub std_popularity: f32,
    pub min_popularity: f32,
    pub max_popularity: f32,
    pub popularity_range: f32,
    pub coefficient_of_variation: f32,
    /// Share of tracks below 30
    pub niche_ratio: f32,
    /// Share of tracks above 70
    pub mainstream_ratio: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalDiversity {
    pub mean_release_year: f32,
    pub std_release_year: f32,
    pub min_release_year: i32,
    pub max_release_year: i32,
    pub year_range: i32,
    /// Released within the last three years
    pub recent_music_ratio: f32,
    /// Released more than ten years ago
    pub vintage_music_ratio: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversityMetrics {
    pub intra_list_diversity: f32,
    pub genre_diversity: GenreDiversity,
    pub artist_diversity: ArtistDiversity,
    /// `None` for an empty list
    pub popularity_diversity: Option<PopularityDiversity>,
    /// `None` when no track has a parsable release year
    pub temporal_diversity: Option<TemporalDiversity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoveltyMetrics {
    pub unique_artists: usize,
    pub avg_popularity_novelty: f32,
    pub avg_release_novelty: f32,
    pub combined_novelty: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularityTierCoverage {
    pub niche: f32,
    pub emerging: f32,
    pub popular: f32,
    pub mainstream: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub genre_coverage: f32,
    pub covered_genres: usize,
    pub total_possible_genres: usize,
    pub popularity_tier_coverage: PopularityTierCoverage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasMetrics {
    pub popularity_bias: f32,
    pub artist_concentration_bias: f32,
    pub genre_concentration_bias: f32,
    pub overall_bias_score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerendipityMetrics {
    pub avg_serendipity: f32,
    pub serendipity_scores: Vec<f32>,
}

/// Fixed weights of the overall quality score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub accuracy: f32,
    pub diversity: f32,
    pub novelty: f32,
    pub coverage: f32,
    pub bias_penalty: f32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.3,
            diversity: 0.25,
            novelty: 0.2,
            coverage: 0.15,
            bias_penalty: 0.1,
        }
    }
}

/// The headline metric behind each quality component
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityComponents {
    /// F1
    pub accuracy: f32,
    /// Intra-list diversity
    pub diversity: f32,
    /// Combined novelty
    pub novelty: f32,
    /// Genre coverage
    pub coverage: f32,
    /// Overall bias score
    pub bias_penalty: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Clamped to [0,1]
    pub overall_score: f32,
    pub component_scores: QualityComponents,
    pub weights: QualityWeights,
}

impl QualityScore {
    pub fn compute(components: QualityComponents, weights: QualityWeights) -> Self {
        let raw = components.accuracy * weights.accuracy
            + components.diversity * weights.diversity
            + components.novelty * weights.novelty
            + components.coverage * weights.coverage
            - components.bias_penalty * weights.bias_penalty;
        Self {
            overall_score: raw.clamp(0.0, 1.0),
            component_scores: components,
            weights,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: AccuracyMetrics,
    pub diversity: DiversityMetrics,
    pub novelty: NoveltyMetrics,
    pub coverage: CoverageMetrics,
    pub bias: BiasMetrics,
    /// Present only when a listener profile was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serendipity: Option<SerendipityMetrics>,
    pub overall_quality: QualityScore,
    pub recommendation_count: usize,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl EvaluationReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Rolling view over the most recent evaluations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluation_count: usize,
    pub avg_quality_score: f32,
    /// Least-squares slope of quality over the window
    pub quality_trend: f32,
    pub avg_diversity_score: f32,
    pub avg_novelty_score: f32,
    pub avg_bias_score: f32,
    pub latest_evaluation: EvaluationReport,
}
