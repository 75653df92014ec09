//! Exploration strategies.
//!
//! - `EpsilonGreedy`: keep the top `len − floor(len * ε)` entries and fill
//!   the rest with random overflow candidates, marked `explored`
//! - `Thompson`: perturb each score with Gaussian noise and reorder by the
//!   perturbed value, kept in `exploration_score`

use crate::traits::{Transform, TransformContext};
use anyhow::{Context, Result};
use data_loader::Recommendation;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_EPSILON: f32 = 0.2;
pub const DEFAULT_NOISE_STD: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ExplorationStrategy {
    EpsilonGreedy { epsilon: f32 },
    Thompson { noise_std: f32 },
}

impl Default for ExplorationStrategy {
    fn default() -> Self {
        ExplorationStrategy::EpsilonGreedy {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Explorer {
    strategy: ExplorationStrategy,
    seed: Option<u64>,
}

impl Explorer {
    pub fn new(strategy: ExplorationStrategy) -> Self {
        Self {
            strategy,
            seed: None,
        }
    }

    /// Fixed seed; every call to `apply` then draws the same numbers
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn strategy(&self) -> ExplorationStrategy {
        self.strategy
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    fn epsilon_greedy(
        &self,
        epsilon: f32,
        mut recommendations: Vec<Recommendation>,
        candidates: &[Recommendation],
    ) -> Vec<Recommendation> {
        let explore = (recommendations.len() as f32 * epsilon.clamp(0.0, 1.0)).floor() as usize;
        if explore == 0 {
            return recommendations;
        }

        let kept: HashSet<&str> = recommendations
            .iter()
            .take(recommendations.len() - explore)
            .map(|r| r.track_id.as_str())
            .collect();
        let pool: Vec<&Recommendation> = candidates
            .iter()
            .filter(|c| !kept.contains(c.track_id.as_str()))
            .collect();
        // Only give up slots the pool can refill
        let explore = explore.min(pool.len());

        let mut rng = self.rng();
        let explored: Vec<Recommendation> = pool
            .choose_multiple(&mut rng, explore)
            .map(|&c| {
                let mut rec = c.clone();
                rec.provenance.explored = true;
                rec
            })
            .collect();

        recommendations.truncate(recommendations.len() - explore);
        recommendations.extend(explored);
        debug!("Explored {} random candidates", explore);
        recommendations
    }

    fn thompson(
        &self,
        noise_std: f32,
        mut recommendations: Vec<Recommendation>,
    ) -> Result<Vec<Recommendation>> {
        let noise = Normal::new(0.0f32, noise_std).context("invalid exploration noise")?;
        let mut rng = self.rng();

        for rec in &mut recommendations {
            rec.provenance.exploration_score = Some(rec.score + noise.sample(&mut rng));
        }
        recommendations.sort_by(|a, b| {
            b.provenance
                .exploration_score
                .partial_cmp(&a.provenance.exploration_score)
                .unwrap_or(Ordering::Equal)
        });
        Ok(recommendations)
    }
}

impl Transform for Explorer {
    fn name(&self) -> &str {
        "Explorer"
    }

    fn apply(
        &self,
        recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        match self.strategy {
            ExplorationStrategy::EpsilonGreedy { epsilon } => {
                Ok(self.epsilon_greedy(epsilon, recommendations, context.candidates))
            }
            ExplorationStrategy::Thompson { noise_std } => self.thompson(noise_std, recommendations),
        }
    }
}
