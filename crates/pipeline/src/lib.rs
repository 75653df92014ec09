//! Blending and debiasing of recommendation lists.
//!
//! This crate provides:
//! - `HybridBlender` that merges per-source scores into one ranked list
//! - The `Transform` trait and `DebiasPipeline` for composing re-rankers
//! - Debiasing transforms: popularity penalty, artist-tier fairness,
//!   diversity injection and adversarial bias correction
//! - `ContextWeighter` for mood, activity and time-of-day boosts
//! - `Explorer` for epsilon-greedy and Thompson-style exploration
//!
//! ## Architecture
//! 1. Scorers return opinions on a candidate pool
//! 2. The blender combines them; the top N form the list, the rest the overflow
//! 3. Transforms rewrite the list, drawing replacements from the overflow
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{DebiasPipeline, HybridBlender, TransformContext};
//! use pipeline::transforms::*;
//!
//! let blended = HybridBlender::default().blend_all(&pool, &source_scores, None);
//! let (top, overflow) = blended.split_at(n.min(blended.len()));
//!
//! let pipeline = DebiasPipeline::new()
//!     .add_transform(PopularityDebiaser::fit(0.5, &catalog))
//!     .add_transform(FairnessEnforcer::new())
//!     .add_transform(DiversityInjector::default());
//!
//! let context = TransformContext::new(&catalog)
//!     .with_profile(profile.as_ref())
//!     .with_candidates(overflow);
//! let debiased = pipeline.apply(top.to_vec(), &context)?;
//! ```

pub mod blender;
pub mod debias_pipeline;
pub mod exploration;
pub mod traits;
pub mod transforms;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use blender::{BlendWeights, DiversityAdjustment, HybridBlender};
pub use debias_pipeline::DebiasPipeline;
pub use exploration::{ExplorationStrategy, Explorer};
pub use traits::{Transform, TransformContext};
