//! Popularity penalty.
//!
//! Scales each score by `1 − strength * penalty`, where the penalty is a
//! sigmoid over the track's popularity normalized against the catalogue:
//!
//! ```text
//! norm    = (pop − min) / (max − min)        (0.5 when max == min)
//! penalty = 1 / (1 + e^(−10 (norm − 0.5)))
//! ```

use crate::traits::{Transform, TransformContext};
use anyhow::Result;
use data_loader::{sort_by_score, Catalog, Recommendation};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const DEFAULT_PENALTY_STRENGTH: f32 = 0.5;

/// Popularity distribution of the catalogue
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularityStats {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub p25: f32,
    pub p50: f32,
    pub p75: f32,
    pub p90: f32,
}

impl PopularityStats {
    pub fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f32;
        let mean = sorted.iter().sum::<f32>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;

        Self {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            p90: percentile(&sorted, 0.90),
        }
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn percentile(sorted: &[f32], q: f32) -> f32 {
    let pos = q * (sorted.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f32)
}

#[derive(Debug, Clone)]
pub struct PopularityDebiaser {
    strength: f32,
    stats: PopularityStats,
}

impl PopularityDebiaser {
    /// Fit against every track in the catalogue. `strength` is clamped
    /// to [0,1].
    pub fn fit(strength: f32, catalog: &Catalog) -> Self {
        let values: Vec<f32> = catalog.tracks().map(|t| t.popularity as f32).collect();
        Self::from_stats(strength, PopularityStats::from_values(&values))
    }

    pub fn from_stats(strength: f32, stats: PopularityStats) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            stats,
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn stats(&self) -> &PopularityStats {
        &self.stats
    }

    /// Penalty in (0,1) for a popularity value
    pub fn penalty(&self, popularity: f32) -> f32 {
        let range = self.stats.max - self.stats.min;
        let norm = if range > 0.0 {
            (popularity - self.stats.min) / range
        } else {
            0.5
        };
        1.0 / (1.0 + (-10.0 * (norm - 0.5)).exp())
    }
}

impl Transform for PopularityDebiaser {
    fn name(&self) -> &str {
        "PopularityDebiaser"
    }

    #[instrument(skip_all, fields(count = recommendations.len(), strength = self.strength))]
    fn apply(
        &self,
        mut recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        for rec in &mut recommendations {
            let popularity = context
                .catalog
                .get_track(&rec.track_id)
                .map(|t| t.popularity as f32)
                .unwrap_or(self.stats.mean);
            let penalty = self.penalty(popularity);

            rec.provenance.original_score.get_or_insert(rec.score);
            rec.provenance.popularity_penalty = Some(penalty);
            rec.score *= 1.0 - self.strength * penalty;
        }
        sort_by_score(&mut recommendations);
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_catalog, ids, recs};

    #[test]
    fn test_stats() {
        let stats = PopularityStats::from_values(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(stats.mean, 30.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.p50, 30.0);
        assert_eq!(stats.p25, 20.0);
        assert!((stats.p90 - 46.0).abs() < 1e-4);
        assert!((stats.std - 200f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_strength_clamped() {
        let catalog = create_test_catalog();
        assert_eq!(PopularityDebiaser::fit(3.0, &catalog).strength(), 1.0);
        assert_eq!(PopularityDebiaser::fit(-1.0, &catalog).strength(), 0.0);
    }

    #[test]
    fn test_penalty_monotonic() {
        let debiaser = PopularityDebiaser::from_stats(
            0.5,
            PopularityStats::from_values(&[0.0, 50.0, 100.0]),
        );
        let penalties: Vec<f32> = (0..=100).step_by(10).map(|p| debiaser.penalty(p as f32)).collect();
        assert!(penalties.windows(2).all(|w| w[0] <= w[1]));
        assert!((debiaser.penalty(50.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_flat_catalogue_uses_midpoint() {
        let debiaser =
            PopularityDebiaser::from_stats(1.0, PopularityStats::from_values(&[40.0, 40.0]));
        assert!((debiaser.penalty(40.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_penalizes_popular_tracks() {
        let catalog = create_test_catalog();
        let debiaser = PopularityDebiaser::fit(0.5, &catalog);
        let context = TransformContext::new(&catalog);

        let out = debiaser
            .apply(recs(&[("hit1", 1.0), ("deep1", 0.9)]), &context)
            .unwrap();

        // Equal-ish raw scores: the niche track overtakes the hit
        assert_eq!(ids(&out), vec!["deep1", "hit1"]);
        let hit = &out[1];
        assert_eq!(hit.provenance.original_score, Some(1.0));
        assert!(hit.provenance.popularity_penalty.unwrap() > 0.9);
        assert!(hit.score < 1.0);
        assert!(out.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn test_unknown_track_uses_mean() {
        let catalog = create_test_catalog();
        let debiaser = PopularityDebiaser::fit(0.5, &catalog);
        let out = debiaser
            .apply(recs(&[("ghost", 1.0)]), &TransformContext::new(&catalog))
            .unwrap();
        let expected = debiaser.penalty(debiaser.stats().mean);
        assert_eq!(out[0].provenance.popularity_penalty, Some(expected));
    }

    #[test]
    fn test_zero_strength_keeps_scores() {
        let catalog = create_test_catalog();
        let debiaser = PopularityDebiaser::fit(0.0, &catalog);
        let out = debiaser
            .apply(recs(&[("hit1", 0.8), ("deep1", 0.4)]), &TransformContext::new(&catalog))
            .unwrap();
        assert_eq!(out[0].score, 0.8);
        assert_eq!(out[1].score, 0.4);
    }
}
