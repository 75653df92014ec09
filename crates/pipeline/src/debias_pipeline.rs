//! The DebiasPipeline chains transforms over a ranked list.

use crate::traits::{Transform, TransformContext};
use anyhow::Result;
use data_loader::Recommendation;

/// Applies transforms in insertion order.
///
/// ## Usage
/// ```ignore
/// let pipeline = DebiasPipeline::new()
///     .add_transform(PopularityDebiaser::fit(0.5, &catalog))
///     .add_transform(FairnessEnforcer::new())
///     .add_transform(DiversityInjector::default());
///
/// let context = TransformContext::new(&catalog)
///     .with_profile(profile.as_ref())
///     .with_candidates(&overflow);
/// let debiased = pipeline.apply(recommendations, &context)?;
/// ```
#[derive(Default)]
pub struct DebiasPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl DebiasPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Add a transform to the end of the chain (builder pattern)
    pub fn add_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Run every transform in sequence, stopping at the first error
    pub fn apply(
        &self,
        recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        let mut current = recommendations;
        for transform in &self.transforms {
            tracing::debug!(
                "Applying transform: {} (input count: {})",
                transform.name(),
                current.len()
            );
            current = transform.apply(current, context)?;
            tracing::debug!(
                "Transform applied: {} (output count: {})",
                transform.name(),
                current.len()
            );
        }
        Ok(current)
    }
}
