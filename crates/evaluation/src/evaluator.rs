//! The recommendation evaluator.
//!
//! Computes a full [`EvaluationReport`] for a finished list and keeps a
//! history for trend summaries. Reporting only: nothing here feeds back
//! into ranking.

use crate::metrics::{gini, intra_list_diversity, linear_trend, mean_std, ndcg_at_k, shannon_entropy};
use crate::report::*;
use chrono::{Datelike, SecondsFormat, Utc};
use data_loader::{jaccard, AudioAttribute, Catalog, Recommendation, Track, TrackId, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument};

pub const NDCG_K: usize = 10;

/// Feature value used when a track or its audio is unknown
const MISSING_FEATURE: f32 = 0.5;
const UNKNOWN_ARTIST: &str = "unknown";

/// A held-out item the listener is known to like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub track_id: TrackId,
    /// Graded relevance; 1 when absent
    #[serde(default)]
    pub rating: Option<f32>,
}

impl GroundTruth {
    pub fn new(track_id: impl Into<TrackId>) -> Self {
        Self {
            track_id: track_id.into(),
            rating: None,
        }
    }

    pub fn with_rating(track_id: impl Into<TrackId>, rating: f32) -> Self {
        Self {
            track_id: track_id.into(),
            rating: Some(rating),
        }
    }

    pub fn relevance(&self) -> f32 {
        self.rating.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationEvaluator {
    reference_year: i32,
    weights: QualityWeights,
    history: Vec<EvaluationReport>,
}

impl Default for RecommendationEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEvaluator {
    pub fn new() -> Self {
        Self {
            reference_year: Utc::now().year(),
            weights: QualityWeights::default(),
            history: Vec::new(),
        }
    }

    /// Year that "recent" and "vintage" are measured against (default: now)
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn history(&self) -> &[EvaluationReport] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Evaluate a list and append the report to the history
    #[instrument(skip_all, fields(count = recommendations.len(), ground_truth = ground_truth.len()))]
    pub fn evaluate(
        &mut self,
        recommendations: &[Recommendation],
        ground_truth: &[GroundTruth],
        catalog: &Catalog,
        profile: Option<&UserProfile>,
    ) -> EvaluationReport {
        let tracks: Vec<Option<&Track>> = recommendations
            .iter()
            .map(|r| catalog.get_track(&r.track_id))
            .collect();

        let accuracy = accuracy_metrics(recommendations, ground_truth);
        let diversity = DiversityMetrics {
            intra_list_diversity: intra_list_diversity(&diversity_vectors(&tracks)),
            genre_diversity: genre_diversity(&tracks),
            artist_diversity: artist_diversity(&tracks),
            popularity_diversity: popularity_diversity(&tracks),
            temporal_diversity: temporal_diversity(&tracks, self.reference_year),
        };
        let novelty = novelty_metrics(&tracks, self.reference_year);
        let coverage = coverage_metrics(&tracks, catalog);
        let bias = bias_metrics(&tracks);
        let serendipity = profile.map(|p| serendipity_metrics(&tracks, p));

        let overall_quality = QualityScore::compute(
            QualityComponents {
                accuracy: accuracy.f1,
                diversity: diversity.intra_list_diversity,
                novelty: novelty.combined_novelty,
                coverage: coverage.genre_coverage,
                bias_penalty: bias.overall_bias_score,
            },
            self.weights,
        );

        let report = EvaluationReport {
            accuracy,
            diversity,
            novelty,
            coverage,
            bias,
            serendipity,
            overall_quality,
            recommendation_count: recommendations.len(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        debug!(
            "Evaluated {} recommendations: quality {:.3}",
            report.recommendation_count, report.overall_quality.overall_score
        );

        self.history.push(report.clone());
        report
    }

    /// Averages over the most recent `n_recent` evaluations; `None` before
    /// the first evaluation
    pub fn evaluation_summary(&self, n_recent: usize) -> Option<EvaluationSummary> {
        let start = self.history.len().saturating_sub(n_recent.max(1));
        let recent = &self.history[start..];
        let latest = recent.last()?;

        let mean_of = |f: fn(&EvaluationReport) -> f32| {
            recent.iter().map(f).sum::<f32>() / recent.len() as f32
        };
        let quality: Vec<f32> = recent
            .iter()
            .map(|r| r.overall_quality.overall_score)
            .collect();

        Some(EvaluationSummary {
            evaluation_count: recent.len(),
            avg_quality_score: mean_of(|r| r.overall_quality.overall_score),
            quality_trend: linear_trend(&quality),
            avg_diversity_score: mean_of(|r| r.diversity.intra_list_diversity),
            avg_novelty_score: mean_of(|r| r.novelty.combined_novelty),
            avg_bias_score: mean_of(|r| r.bias.overall_bias_score),
            latest_evaluation: latest.clone(),
        })
    }
}

fn popularity_of(track: &Option<&Track>) -> f32 {
    track.map(|t| t.popularity as f32).unwrap_or(0.0)
}

fn artist_of<'a>(track: &Option<&'a Track>) -> &'a str {
    track.map(|t| t.artist_id.as_str()).unwrap_or(UNKNOWN_ARTIST)
}

fn genre_counts<'a>(tracks: &[Option<&'a Track>]) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for track in tracks.iter().flatten() {
        for genre in &track.genres {
            *counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }
    counts
}

fn artist_counts<'a>(tracks: &[Option<&'a Track>]) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for track in tracks {
        *counts.entry(artist_of(track)).or_insert(0) += 1;
    }
    counts
}

fn counts_as_f32<'a>(counts: impl IntoIterator<Item = &'a usize>) -> Vec<f32> {
    counts.into_iter().map(|&c| c as f32).collect()
}

fn accuracy_metrics(recommendations: &[Recommendation], ground_truth: &[GroundTruth]) -> AccuracyMetrics {
    if ground_truth.is_empty() {
        return AccuracyMetrics::default();
    }

    let recommended: HashSet<&str> = recommendations.iter().map(|r| r.track_id.as_str()).collect();
    let relevant: HashSet<&str> = ground_truth.iter().map(|g| g.track_id.as_str()).collect();
    let true_positives = recommended.intersection(&relevant).count();

    let precision = if recommended.is_empty() {
        0.0
    } else {
        true_positives as f32 / recommended.len() as f32
    };
    let recall = true_positives as f32 / relevant.len() as f32;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let relevance: HashMap<String, f32> = ground_truth
        .iter()
        .map(|g| (g.track_id.clone(), g.relevance()))
        .collect();
    let ranked: Vec<&str> = recommendations.iter().map(|r| r.track_id.as_str()).collect();

    AccuracyMetrics {
        precision,
        recall,
        f1,
        ndcg: ndcg_at_k(&ranked, &relevance, NDCG_K),
        true_positives,
        recommended_count: recommended.len(),
        ground_truth_count: relevant.len(),
    }
}

fn diversity_vectors(tracks: &[Option<&Track>]) -> Vec<Vec<f32>> {
    tracks
        .iter()
        .map(|track| {
            AudioAttribute::DIVERSITY_VECTOR
                .iter()
                .map(|&attr| {
                    track
                        .and_then(|t| t.audio.as_ref())
                        .map(|audio| audio.get(attr))
                        .unwrap_or(MISSING_FEATURE)
                })
                .collect()
        })
        .collect()
}

fn genre_diversity(tracks: &[Option<&Track>]) -> GenreDiversity {
    let counts = genre_counts(tracks);
    let unique_genres = counts.len();
    let genre_entropy = shannon_entropy(counts.values().copied());
    let genre_balance = if unique_genres > 1 {
        genre_entropy / (unique_genres as f32).log2()
    } else {
        0.0
    };

    GenreDiversity {
        unique_genres,
        genre_entropy,
        genre_balance,
        genre_distribution: counts.into_iter().map(|(g, c)| (g.to_string(), c)).collect(),
    }
}

fn artist_diversity(tracks: &[Option<&Track>]) -> ArtistDiversity {
    let counts = artist_counts(tracks);
    let total_tracks = tracks.len();
    ArtistDiversity {
        unique_artists: counts.len(),
        total_tracks,
        artist_diversity_ratio: if total_tracks > 0 {
            counts.len() as f32 / total_tracks as f32
        } else {
            0.0
        },
        artist_concentration_gini: gini(&counts_as_f32(counts.values())),
    }
}

fn popularity_diversity(tracks: &[Option<&Track>]) -> Option<PopularityDiversity> {
    if tracks.is_empty() {
        return None;
    }
    let pops: Vec<f32> = tracks.iter().map(popularity_of).collect();
    let (mean, std) = mean_std(&pops);
    let min = pops.iter().copied().fold(f32::INFINITY, f32::min);
    let max = pops.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let n = pops.len() as f32;

    Some(PopularityDiversity {
        mean_popularity: mean,
        std_popularity: std,
        min_popularity: min,
        max_popularity: max,
        popularity_range: max - min,
        coefficient_of_variation: if mean > 0.0 { std / mean } else { 0.0 },
        niche_ratio: pops.iter().filter(|&&p| p < 30.0).count() as f32 / n,
        mainstream_ratio: pops.iter().filter(|&&p| p > 70.0).count() as f32 / n,
    })
}

fn temporal_diversity(tracks: &[Option<&Track>], reference_year: i32) -> Option<TemporalDiversity> {
    let years: Vec<i32> = tracks.iter().flatten().filter_map(|t| t.release_year()).collect();
    let min = *years.iter().min()?;
    let max = *years.iter().max()?;

    let as_f32: Vec<f32> = years.iter().map(|&y| y as f32).collect();
    let (mean, std) = mean_std(&as_f32);
    let n = years.len() as f32;

    Some(TemporalDiversity {
        mean_release_year: mean,
        std_release_year: std,
        min_release_year: min,
        max_release_year: max,
        year_range: max - min,
        recent_music_ratio: years.iter().filter(|&&y| y >= reference_year - 3).count() as f32 / n,
        vintage_music_ratio: years.iter().filter(|&&y| y < reference_year - 10).count() as f32 / n,
    })
}

fn novelty_metrics(tracks: &[Option<&Track>], reference_year: i32) -> NoveltyMetrics {
    let unique_artists: HashSet<&str> = tracks.iter().flatten().map(|t| t.artist_id.as_str()).collect();

    let popularity_novelty: Vec<f32> = tracks
        .iter()
        .map(|t| (100.0 - popularity_of(t)) / 100.0)
        .collect();

    // Dated tracks only; a date with no readable year counts as 0.5
    let release_novelty: Vec<f32> = tracks
        .iter()
        .flatten()
        .filter(|t| t.release_date.is_some())
        .map(|t| match t.release_year() {
            Some(year) => (1.0 - (reference_year - year) as f32 / 50.0).max(0.0),
            None => 0.5,
        })
        .collect();

    let (avg_popularity_novelty, _) = mean_std(&popularity_novelty);
    let (avg_release_novelty, _) = mean_std(&release_novelty);

    NoveltyMetrics {
        unique_artists: unique_artists.len(),
        avg_popularity_novelty,
        avg_release_novelty,
        combined_novelty: (avg_popularity_novelty + avg_release_novelty) / 2.0,
    }
}

fn coverage_metrics(tracks: &[Option<&Track>], catalog: &Catalog) -> CoverageMetrics {
    let all_genres = catalog.all_genres();
    let covered: BTreeSet<&str> = tracks
        .iter()
        .flatten()
        .flat_map(|t| t.genres.iter().map(String::as_str))
        .collect();

    let mut tiers = PopularityTierCoverage::default();
    for track in tracks {
        let popularity = popularity_of(track);
        let tier = if popularity < 30.0 {
            &mut tiers.niche
        } else if popularity < 60.0 {
            &mut tiers.emerging
        } else if popularity < 80.0 {
            &mut tiers.popular
        } else {
            &mut tiers.mainstream
        };
        *tier += 1.0;
    }
    if !tracks.is_empty() {
        let n = tracks.len() as f32;
        tiers.niche /= n;
        tiers.emerging /= n;
        tiers.popular /= n;
        tiers.mainstream /= n;
    }

    CoverageMetrics {
        genre_coverage: if all_genres.is_empty() {
            0.0
        } else {
            covered.len() as f32 / all_genres.len() as f32
        },
        covered_genres: covered.len(),
        total_possible_genres: all_genres.len(),
        popularity_tier_coverage: tiers,
    }
}

fn bias_metrics(tracks: &[Option<&Track>]) -> BiasMetrics {
    let pops: Vec<f32> = tracks.iter().map(popularity_of).collect();
    let (mean_popularity, _) = mean_std(&pops);

    let popularity_bias = mean_popularity / 100.0;
    let artist_concentration_bias = gini(&counts_as_f32(artist_counts(tracks).values()));
    let genre_concentration_bias = gini(&counts_as_f32(genre_counts(tracks).values()));

    BiasMetrics {
        popularity_bias,
        artist_concentration_bias,
        genre_concentration_bias,
        overall_bias_score: (popularity_bias + artist_concentration_bias + genre_concentration_bias)
            / 3.0,
    }
}

fn serendipity_metrics(tracks: &[Option<&Track>], profile: &UserProfile) -> SerendipityMetrics {
    let profile_genres = profile.genre_set();

    let serendipity_scores: Vec<f32> = tracks
        .iter()
        .map(|track| {
            let overlap = track.map_or(0.0, |t| jaccard(&t.genres, &profile_genres));
            let popularity_gap = (popularity_of(track) - profile.avg_popularity).abs() / 100.0;

            let unexpectedness = ((1.0 - overlap) + popularity_gap) / 2.0;
            let relevance = 1.0 - unexpectedness * 0.5;
            unexpectedness * relevance
        })
        .collect();

    let (avg_serendipity, _) = mean_std(&serendipity_scores);
    SerendipityMetrics {
        avg_serendipity,
        serendipity_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{build_user_profile, Artist, AudioFeatures, Interaction};

    fn track(id: &str, artist: &str, popularity: u8, genre: &str, year: &str, energy: f32) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            artist_id: artist.to_string(),
            artist_name: artist.to_string(),
            popularity,
            release_date: Some(year.to_string()),
            genres: [genre.to_string()].into_iter().collect(),
            audio: Some(AudioFeatures {
                danceability: energy,
                energy,
                valence: 1.0 - energy,
                acousticness: 0.3,
                instrumentalness: 0.1,
                speechiness: 0.05,
                liveness: 0.1,
                tempo: 120.0,
                loudness: -7.0,
            }),
            duration_ms: None,
        }
    }

    fn create_test_catalog() -> Catalog {
        let tracks = vec![
            track("a", "artist-1", 90, "pop", "2023-05-01", 0.9),
            track("b", "artist-2", 20, "jazz", "1975", 0.2),
            track("c", "artist-3", 50, "rock", "2010-01-01", 0.6),
            track("d", "artist-4", 75, "folk", "2000", 0.4),
            track("e", "artist-1", 85, "pop", "sometime", 0.8),
        ];
        let artists = (1..=4)
            .map(|i| Artist {
                id: format!("artist-{i}"),
                name: format!("Artist {i}"),
                popularity: 50,
                genres: Default::default(),
            })
            .collect();
        let interactions = vec![Interaction {
            user_id: "listener".to_string(),
            track_id: "a".to_string(),
            rating: 5.0,
            timestamp: None,
        }];
        Catalog::from_parts(tracks, artists, interactions).unwrap()
    }

    fn recs(ids: &[&str]) -> Vec<Recommendation> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Recommendation::new(*id, 1.0 - i as f32 * 0.1))
            .collect()
    }

    fn evaluator() -> RecommendationEvaluator {
        RecommendationEvaluator::new().with_reference_year(2025)
    }

    #[test]
    fn test_empty_ground_truth_gives_zero_accuracy() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a", "b"]), &[], &catalog, None);
        assert_eq!(report.accuracy, AccuracyMetrics::default());
    }

    #[test]
    fn test_accuracy() {
        let catalog = create_test_catalog();
        let truth = vec![GroundTruth::new("a"), GroundTruth::new("c"), GroundTruth::new("x")];
        let report = evaluator().evaluate(&recs(&["a", "b", "c", "d"]), &truth, &catalog, None);

        let acc = &report.accuracy;
        assert_eq!(acc.true_positives, 2);
        assert_eq!(acc.recommended_count, 4);
        assert_eq!(acc.ground_truth_count, 3);
        assert!((acc.precision - 0.5).abs() < 1e-6);
        assert!((acc.recall - 2.0 / 3.0).abs() < 1e-6);
        assert!((acc.f1 - 4.0 / 7.0).abs() < 1e-5);
        assert!(acc.ndcg > 0.0 && acc.ndcg < 1.0);
    }

    #[test]
    fn test_ndcg_perfect_ranking() {
        let catalog = create_test_catalog();
        let truth = vec![GroundTruth::with_rating("c", 5.0), GroundTruth::with_rating("a", 3.0)];
        let report = evaluator().evaluate(&recs(&["c", "a"]), &truth, &catalog, None);
        assert!((report.accuracy.ndcg - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_diversity() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a", "b", "c", "d"]), &[], &catalog, None);
        let div = &report.diversity;

        assert!(div.intra_list_diversity > 0.0);
        assert_eq!(div.genre_diversity.unique_genres, 4);
        assert!((div.genre_diversity.genre_entropy - 2.0).abs() < 1e-6);
        assert!((div.genre_diversity.genre_balance - 1.0).abs() < 1e-6);
        // Four artists, once each
        assert_eq!(div.artist_diversity.unique_artists, 4);
        assert!(div.artist_diversity.artist_concentration_gini.abs() < 1e-6);

        let pop = div.popularity_diversity.as_ref().unwrap();
        assert_eq!(pop.min_popularity, 20.0);
        assert_eq!(pop.max_popularity, 90.0);
        assert_eq!(pop.popularity_range, 70.0);
        assert!((pop.niche_ratio - 0.25).abs() < 1e-6);
        assert!((pop.mainstream_ratio - 0.5).abs() < 1e-6);

        let temporal = div.temporal_diversity.as_ref().unwrap();
        assert_eq!(temporal.min_release_year, 1975);
        assert_eq!(temporal.year_range, 48);
        assert!((temporal.recent_music_ratio - 0.25).abs() < 1e-6);
        assert!((temporal.vintage_music_ratio - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_single_item_has_zero_ild() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a"]), &[], &catalog, None);
        assert_eq!(report.diversity.intra_list_diversity, 0.0);
    }

    #[test]
    fn test_unknown_tracks_use_defaults() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["ghost1", "ghost2"]), &[], &catalog, None);

        // Identical 0.5 vectors
        assert!(report.diversity.intra_list_diversity.abs() < 1e-6);
        assert!(report.diversity.temporal_diversity.is_none());
        assert_eq!(report.novelty.avg_popularity_novelty, 1.0);
        assert_eq!(report.coverage.popularity_tier_coverage.niche, 1.0);
        assert_eq!(report.diversity.artist_diversity.unique_artists, 1);
    }

    #[test]
    fn test_novelty() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a", "e"]), &[], &catalog, None);
        let novelty = &report.novelty;

        assert_eq!(novelty.unique_artists, 1);
        assert!((novelty.avg_popularity_novelty - 0.125).abs() < 1e-6);
        // 2023 → 1 − 2/50, unreadable date → 0.5
        assert!((novelty.avg_release_novelty - (0.96 + 0.5) / 2.0).abs() < 1e-5);
        assert!(
            (novelty.combined_novelty
                - (novelty.avg_popularity_novelty + novelty.avg_release_novelty) / 2.0)
                .abs()
                < 1e-6
        );
    }

    #[test]
    fn test_coverage_and_bias() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a", "e"]), &[], &catalog, None);

        assert_eq!(report.coverage.total_possible_genres, 4);
        assert_eq!(report.coverage.covered_genres, 1);
        assert!((report.coverage.genre_coverage - 0.25).abs() < 1e-6);
        assert_eq!(report.coverage.popularity_tier_coverage.mainstream, 1.0);

        let bias = &report.bias;
        assert!((bias.popularity_bias - 0.875).abs() < 1e-6);
        // One artist, one genre: nothing to be unequal about
        assert_eq!(bias.artist_concentration_bias, 0.0);
        assert_eq!(bias.genre_concentration_bias, 0.0);
        assert!((bias.overall_bias_score - 0.875 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_serendipity_needs_profile() {
        let catalog = create_test_catalog();
        let profile = build_user_profile(&catalog, "listener").unwrap();

        let without = evaluator().evaluate(&recs(&["a", "b"]), &[], &catalog, None);
        assert!(without.serendipity.is_none());

        let with = evaluator().evaluate(&recs(&["a", "b"]), &[], &catalog, Some(&profile));
        let serendipity = with.serendipity.unwrap();
        assert_eq!(serendipity.serendipity_scores.len(), 2);
        // The listener's own track is expected; the jazz one is not
        assert!(serendipity.serendipity_scores[0] < serendipity.serendipity_scores[1]);
        assert_eq!(serendipity.serendipity_scores[0], 0.0);
    }

    #[test]
    fn test_serendipity_of_unknown_track() {
        let catalog = create_test_catalog();
        let profile = build_user_profile(&catalog, "listener").unwrap();

        let report = evaluator().evaluate(&recs(&["ghost"]), &[], &catalog, Some(&profile));
        let score = report.serendipity.unwrap().serendipity_scores[0];
        // no genre overlap, popularity gap 0.9: 0.95 * (1 - 0.475)
        assert!((score - 0.49875).abs() < 1e-5);
    }

    #[test]
    fn test_quality_in_unit_range() {
        let catalog = create_test_catalog();
        let truth = vec![GroundTruth::new("b")];
        let report = evaluator().evaluate(&recs(&["b", "c", "d"]), &truth, &catalog, None);
        let quality = &report.overall_quality;
        assert!((0.0..=1.0).contains(&quality.overall_score));
        assert_eq!(quality.component_scores.accuracy, report.accuracy.f1);
        assert_eq!(quality.weights, QualityWeights::default());
    }

    #[test]
    fn test_history_and_summary() {
        let catalog = create_test_catalog();
        let mut evaluator = evaluator();
        assert!(evaluator.evaluation_summary(10).is_none());

        evaluator.evaluate(&recs(&["a", "e"]), &[], &catalog, None);
        evaluator.evaluate(&recs(&["a", "b", "c", "d"]), &[], &catalog, None);
        evaluator.evaluate(&recs(&["b", "c", "d"]), &[GroundTruth::new("b")], &catalog, None);
        assert_eq!(evaluator.history().len(), 3);

        let summary = evaluator.evaluation_summary(2).unwrap();
        assert_eq!(summary.evaluation_count, 2);
        assert_eq!(summary.latest_evaluation.recommendation_count, 3);
        let q: Vec<f32> = evaluator.history()[1..]
            .iter()
            .map(|r| r.overall_quality.overall_score)
            .collect();
        assert!((summary.avg_quality_score - (q[0] + q[1]) / 2.0).abs() < 1e-6);
        assert!((summary.quality_trend - (q[1] - q[0])).abs() < 1e-5);

        evaluator.clear_history();
        assert!(evaluator.evaluation_summary(5).is_none());
    }

    #[test]
    fn test_report_serializes() {
        let catalog = create_test_catalog();
        let report = evaluator().evaluate(&recs(&["a", "b"]), &[], &catalog, None);
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"overall_quality\""));
        assert!(!json.contains("\"serendipity\""));
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }
}
