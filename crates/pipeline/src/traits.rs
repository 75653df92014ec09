//! Core traits for the debiasing pipeline.
//!
//! A [`Transform`] takes a ranked recommendation list and returns a new
//! one. Transforms compose in a [`crate::DebiasPipeline`].

use anyhow::Result;
use crate::transforms::ListeningContext;
use data_loader::{Catalog, Recommendation, UserProfile};

/// What a transform may consult besides the list itself
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    pub catalog: &'a Catalog,
    /// `None` for listeners with no history
    pub profile: Option<&'a UserProfile>,
    /// Blended candidates that did not make the list, best first.
    /// Replacement and injection draw from here.
    pub candidates: &'a [Recommendation],
    /// Mood, activity and time of day stated with the request
    pub listening: Option<&'a ListeningContext>,
}

impl<'a> TransformContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            profile: None,
            candidates: &[],
            listening: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<&'a UserProfile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_candidates(mut self, candidates: &'a [Recommendation]) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_listening(mut self, listening: Option<&'a ListeningContext>) -> Self {
        self.listening = listening;
        self
    }
}

/// A re-ranking step over a recommendation list.
///
/// - `Send + Sync` so a pipeline can be shared behind an `Arc`
/// - The list is taken by value and returned, so transforms can reorder
///   and rewrite entries without cloning
/// - A transform never returns more entries than it was given
pub trait Transform: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    fn apply(
        &self,
        recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>>;
}
