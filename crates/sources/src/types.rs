//! Shared types for the per-source scorers.

use data_loader::{TrackId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Which signal produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreSource {
    Collaborative,
    Content,
    Popularity,
}

/// A source's opinion: track -> raw score. Absent tracks mean "no opinion".
pub type SourceScores = HashMap<TrackId, f32>;

/// What a scorer is asked to score
#[derive(Debug, Clone, Default)]
pub struct ScoringRequest {
    pub user_id: UserId,
    pub liked: Vec<TrackId>,
    /// Candidate pool, deduplicated, first occurrence kept
    pub candidates: Vec<TrackId>,
    /// Maximum number of candidates a source may return an opinion on
    pub depth: usize,
}

impl ScoringRequest {
    pub fn new(
        user_id: impl Into<UserId>,
        liked: Vec<TrackId>,
        candidates: Vec<TrackId>,
        depth: usize,
    ) -> Self {
        let mut seen = HashSet::with_capacity(candidates.len());
        let candidates = candidates
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            user_id: user_id.into(),
            liked,
            candidates,
            depth,
        }
    }
}

/// A fitted model that can score a candidate pool.
///
/// `Send + Sync` so the orchestrator can run scorers on blocking threads.
pub trait Scorer: Send + Sync {
    fn source(&self) -> ScoreSource;

    fn is_fitted(&self) -> bool;

    /// Score the request's candidates, returning at most `request.depth`
    /// opinions. An unfitted scorer returns an empty map.
    fn score(&self, request: &ScoringRequest) -> SourceScores;
}

/// Keep the `depth` highest scores; ties keep pool order
pub(crate) fn keep_top(mut scored: Vec<(TrackId, f32)>, depth: usize) -> SourceScores {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(depth);
    scored.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deduplicates_pool() {
        let request = ScoringRequest::new(
            "u1",
            vec![],
            vec!["a".into(), "b".into(), "a".into(), "c".into()],
            10,
        );
        assert_eq!(request.candidates, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keep_top() {
        let scores = keep_top(
            vec![("a".into(), 0.1), ("b".into(), 0.9), ("c".into(), 0.5)],
            2,
        );
        assert_eq!(scores.len(), 2);
        assert!(scores.contains_key("b"));
        assert!(scores.contains_key("c"));
    }
}
