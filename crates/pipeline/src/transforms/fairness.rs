//! Artist-tier fairness.
//!
//! Artists are bucketed by popularity:
//!
//! | tier        | popularity |
//! |-------------|------------|
//! | niche       | < 30       |
//! | emerging    | 30..60     |
//! | established | 60..80     |
//! | mainstream  | >= 80      |
//!
//! When a list holds too few niche entries, the first mainstream entries
//! are flagged with `needs_niche_replacement` and swapped for niche
//! candidates from the overflow pool while any remain. The replacement
//! carries the flag too. A flagged entry with no replacement stays in
//! place, still flagged.

use crate::traits::{Transform, TransformContext};
use anyhow::Result;
use data_loader::{Catalog, Recommendation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument};

pub const DEFAULT_MIN_NICHE_RATIO: f32 = 0.3;
pub const DEFAULT_MIN_DIVERSE_GENRES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtistTier {
    Niche,
    Emerging,
    Established,
    Mainstream,
}

impl ArtistTier {
    pub fn from_popularity(popularity: u8) -> Self {
        match popularity {
            0..=29 => ArtistTier::Niche,
            30..=59 => ArtistTier::Emerging,
            60..=79 => ArtistTier::Established,
            _ => ArtistTier::Mainstream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FairnessViolation {
    InsufficientNiche {
        current_ratio: f32,
        required_ratio: f32,
        deficit: f32,
    },
    InsufficientGenreDiversity {
        current_genres: usize,
        required_genres: usize,
    },
}

/// Exposure summary for a recommendation list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FairnessMetrics {
    /// Distinct artists over recommendations
    pub artist_diversity: f32,
    pub unique_artists: usize,
    pub total_recommendations: usize,
    /// Distinct genres covered
    pub genre_diversity: usize,
    /// Share of recommendations by niche artists
    pub niche_artist_ratio: f32,
    pub avg_artist_popularity: f32,
    pub artist_popularity_std: f32,
    /// Recommendations per tier
    pub tier_distribution: HashMap<ArtistTier, usize>,
}

#[derive(Debug, Clone)]
pub struct FairnessEnforcer {
    min_niche_ratio: f32,
    min_diverse_genres: usize,
}

impl Default for FairnessEnforcer {
    fn default() -> Self {
        Self::new()
    }
}

impl FairnessEnforcer {
    pub fn new() -> Self {
        Self {
            min_niche_ratio: DEFAULT_MIN_NICHE_RATIO,
            min_diverse_genres: DEFAULT_MIN_DIVERSE_GENRES,
        }
    }

    pub fn with_min_niche_ratio(mut self, ratio: f32) -> Self {
        self.min_niche_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_min_diverse_genres(mut self, genres: usize) -> Self {
        self.min_diverse_genres = genres;
        self
    }

    /// Tier of the artist behind a track; `None` for unknown tracks
    pub fn tier_of(catalog: &Catalog, track_id: &str) -> Option<ArtistTier> {
        catalog
            .get_track(track_id)
            .map(|track| ArtistTier::from_popularity(catalog.artist_popularity(track)))
    }

    /// Constraints the list currently breaks. An empty list breaks none.
    pub fn check(&self, recommendations: &[Recommendation], catalog: &Catalog) -> Vec<FairnessViolation> {
        let mut violations = Vec::new();
        if recommendations.is_empty() {
            return violations;
        }

        let niche = recommendations
            .iter()
            .filter(|r| Self::tier_of(catalog, &r.track_id) == Some(ArtistTier::Niche))
            .count();
        let current_ratio = niche as f32 / recommendations.len() as f32;
        if current_ratio < self.min_niche_ratio {
            violations.push(FairnessViolation::InsufficientNiche {
                current_ratio,
                required_ratio: self.min_niche_ratio,
                deficit: self.min_niche_ratio - current_ratio,
            });
        }

        let genres = genres_of(recommendations, catalog);
        if genres.len() < self.min_diverse_genres {
            violations.push(FairnessViolation::InsufficientGenreDiversity {
                current_genres: genres.len(),
                required_genres: self.min_diverse_genres,
            });
        }

        violations
    }

    pub fn fairness_metrics(&self, recommendations: &[Recommendation], catalog: &Catalog) -> FairnessMetrics {
        let mut tier_distribution: HashMap<ArtistTier, usize> = HashMap::new();
        let mut artist_popularity: HashMap<&str, u8> = HashMap::new();

        for rec in recommendations {
            let Some(track) = catalog.get_track(&rec.track_id) else {
                continue;
            };
            let popularity = catalog.artist_popularity(track);
            *tier_distribution
                .entry(ArtistTier::from_popularity(popularity))
                .or_insert(0) += 1;
            artist_popularity.insert(track.artist_id.as_str(), popularity);
        }

        let unique_artists = artist_popularity.len();
        let total_recommendations = recommendations.len();
        let mut metrics = FairnessMetrics {
            unique_artists,
            total_recommendations,
            genre_diversity: genres_of(recommendations, catalog).len(),
            tier_distribution,
            ..FairnessMetrics::default()
        };
        if unique_artists == 0 {
            return metrics;
        }

        let n = unique_artists as f32;
        let pops: Vec<f32> = artist_popularity.values().map(|&p| p as f32).collect();
        let mean = pops.iter().sum::<f32>() / n;
        metrics.artist_diversity = unique_artists as f32 / total_recommendations as f32;
        metrics.niche_artist_ratio = metrics
            .tier_distribution
            .get(&ArtistTier::Niche)
            .copied()
            .unwrap_or(0) as f32
            / total_recommendations as f32;
        metrics.avg_artist_popularity = mean;
        metrics.artist_popularity_std =
            (pops.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / n).sqrt();
        metrics
    }
}

fn genres_of<'a>(recommendations: &[Recommendation], catalog: &'a Catalog) -> BTreeSet<&'a str> {
    recommendations
        .iter()
        .filter_map(|r| catalog.get_track(&r.track_id))
        .flat_map(|t| t.genres.iter().map(String::as_str))
        .collect()
}

impl Transform for FairnessEnforcer {
    fn name(&self) -> &str {
        "FairnessEnforcer"
    }

    #[instrument(skip_all, fields(count = recommendations.len()))]
    fn apply(
        &self,
        mut recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        let catalog = context.catalog;
        let mut deficit = None;
        for violation in self.check(&recommendations, catalog) {
            match violation {
                FairnessViolation::InsufficientNiche { deficit: d, .. } => deficit = Some(d),
                FairnessViolation::InsufficientGenreDiversity {
                    current_genres,
                    required_genres,
                } => debug!("Only {current_genres} of {required_genres} genres represented"),
            }
        }
        let Some(deficit) = deficit else {
            return Ok(recommendations);
        };

        let to_flag = (recommendations.len() as f32 * deficit).floor() as usize;
        let flagged: Vec<usize> = recommendations
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::tier_of(catalog, &r.track_id) == Some(ArtistTier::Mainstream))
            .map(|(i, _)| i)
            .take(to_flag)
            .collect();
        for &i in &flagged {
            recommendations[i].provenance.needs_niche_replacement = true;
        }

        let present: HashSet<String> = recommendations.iter().map(|r| r.track_id.clone()).collect();
        let mut niche_pool = context.candidates.iter().filter(|c| {
            !present.contains(&c.track_id)
                && Self::tier_of(catalog, &c.track_id) == Some(ArtistTier::Niche)
        });

        let mut replaced = 0;
        for &i in &flagged {
            let Some(candidate) = niche_pool.next() else {
                break;
            };
            let slot = &mut recommendations[i];
            let mut provenance = candidate.provenance.clone();
            provenance.original_score.get_or_insert(candidate.score);
            provenance.injected = true;
            provenance.needs_niche_replacement = true;
            *slot = Recommendation {
                track_id: candidate.track_id.clone(),
                score: slot.score,
                provenance,
            };
            replaced += 1;
        }

        debug!(
            "Flagged {} mainstream entries, replaced {} with niche candidates",
            flagged.len(),
            replaced
        );
        Ok(recommendations)
    }
}
