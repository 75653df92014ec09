//! Diversity injection.
//!
//! Swaps the lowest-scored entries for the overflow candidates that sit
//! furthest from the listener's profile. Injected entries score
//! `score + distance * strength`; the rest keep their score.

use crate::traits::{Transform, TransformContext};
use anyhow::Result;
use data_loader::{sort_by_score, Recommendation};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, instrument};

pub const DEFAULT_INJECTION_STRENGTH: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct DiversityInjector {
    strength: f32,
}

impl Default for DiversityInjector {
    fn default() -> Self {
        Self::new(DEFAULT_INJECTION_STRENGTH)
    }
}

impl DiversityInjector {
    /// `strength` is clamped to [0,1]
    pub fn new(strength: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }
}

impl Transform for DiversityInjector {
    fn name(&self) -> &str {
        "DiversityInjector"
    }

    #[instrument(skip_all, fields(count = recommendations.len(), strength = self.strength))]
    fn apply(
        &self,
        mut recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        let Some(profile) = context.profile else {
            return Ok(recommendations);
        };

        let present: HashSet<&str> = recommendations.iter().map(|r| r.track_id.as_str()).collect();
        let mut diverse: Vec<(&Recommendation, f32)> = context
            .candidates
            .iter()
            .filter(|c| !present.contains(c.track_id.as_str()))
            .filter_map(|c| {
                let track = context.catalog.get_track(&c.track_id)?;
                Some((c, profile.distance_to(track)))
            })
            .collect();
        diverse.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let n = ((recommendations.len() as f32 * self.strength).floor() as usize).min(diverse.len());
        if n == 0 {
            return Ok(recommendations);
        }

        let injected: Vec<Recommendation> = diverse
            .into_iter()
            .take(n)
            .map(|(candidate, distance)| {
                let mut rec = candidate.clone();
                rec.provenance.original_score.get_or_insert(candidate.score);
                rec.provenance.diversity_score = Some(distance);
                rec.provenance.injected = true;
                rec.score = candidate.score + distance * self.strength;
                rec
            })
            .collect();

        sort_by_score(&mut recommendations);
        recommendations.truncate(recommendations.len() - n);
        recommendations.extend(injected);
        sort_by_score(&mut recommendations);

        debug!("Injected {} diverse candidates", n);
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_catalog, ids, listener_profile, recs};

    #[test]
    fn test_no_profile_is_identity() {
        let catalog = create_test_catalog();
        let list = recs(&[("hit1", 0.9), ("hit2", 0.8), ("hit3", 0.7)]);
        let pool = recs(&[("deep1", 0.2)]);
        let context = TransformContext::new(&catalog).with_candidates(&pool);

        let out = DiversityInjector::new(1.0).apply(list.clone(), &context).unwrap();
        assert_eq!(out, list);
    }

    #[test]
    fn test_replaces_lowest_scored() {
        let catalog = create_test_catalog();
        let profile = listener_profile(&catalog);
        let list = recs(&[
            ("hit1", 0.9),
            ("hit2", 0.8),
            ("hit3", 0.7),
            ("mid1", 0.6),
            ("mid2", 0.5),
            ("deep3", 0.4),
        ]);
        let pool = recs(&[("deep1", 0.3), ("deep2", 0.2), ("hit1", 0.1)]);
        let context = TransformContext::new(&catalog)
            .with_profile(Some(&profile))
            .with_candidates(&pool);

        let out = DiversityInjector::new(0.34).apply(list, &context).unwrap();

        // floor(6 * 0.34) = 2 swaps: mid2 and deep3 make way
        assert_eq!(out.len(), 6);
        let out_ids = ids(&out);
        assert!(!out_ids.contains(&"mid2"));
        assert!(!out_ids.contains(&"deep3"));
        assert!(out_ids.contains(&"deep1"));
        assert!(out_ids.contains(&"deep2"));
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));

        let injected = out.iter().find(|r| r.track_id == "deep2").unwrap();
        let distance = injected.provenance.diversity_score.unwrap();
        assert!(injected.provenance.injected);
        assert!((injected.score - (0.2 + distance * 0.34)).abs() < 1e-6);
    }

    #[test]
    fn test_never_grows() {
        let catalog = create_test_catalog();
        let profile = listener_profile(&catalog);
        let list = recs(&[("hit1", 0.9), ("hit2", 0.8), ("hit3", 0.7), ("mid1", 0.6)]);
        let pool = recs(&[("deep1", 0.3)]);
        let context = TransformContext::new(&catalog)
            .with_profile(Some(&profile))
            .with_candidates(&pool);

        // Wants 4 swaps, only one candidate available
        let out = DiversityInjector::new(1.0).apply(list, &context).unwrap();
        assert_eq!(out.len(), 4);
        assert!(ids(&out).contains(&"deep1"));
        assert!(!ids(&out).contains(&"mid1"));
    }

    #[test]
    fn test_empty_pool_is_identity() {
        let catalog = create_test_catalog();
        let profile = listener_profile(&catalog);
        let list = recs(&[("hit1", 0.9), ("hit2", 0.8)]);
        let context = TransformContext::new(&catalog).with_profile(Some(&profile));

        let out = DiversityInjector::default().apply(list.clone(), &context).unwrap();
        assert_eq!(out, list);
    }
}
