//! Popularity-based scoring
//!
//! `score = mean_rating * ln(1 + count) / ln(1 + max_count)`
//!
//! The log-count factor keeps a handful of perfect ratings from outranking
//! a track that hundreds of listeners rated well.

use crate::error::{ModelError, Result};
use crate::types::{keep_top, ScoreSource, Scorer, ScoringRequest, SourceScores};
use data_loader::{Interaction, TrackId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopularityScorer {
    /// Tracks ranked by descending score, ties by id
    ranked: Vec<(TrackId, f32)>,
    #[serde(skip)]
    scores: HashMap<TrackId, f32>,
}

impl PopularityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip_all)]
    pub fn fit<'a>(
        &mut self,
        interactions: impl IntoIterator<Item = &'a Interaction>,
    ) -> Result<()> {
        let log: Vec<&Interaction> = interactions.into_iter().collect();
        if log.is_empty() {
            return Err(ModelError::InsufficientData {
                model: "PopularityScorer",
                reason: "interaction log is empty".to_string(),
            });
        }

        let totals: HashMap<&str, (f32, u32)> = log
            .par_iter()
            .fold(HashMap::new, |mut local, i| {
                let entry = local.entry(i.track_id.as_str()).or_insert((0.0, 0));
                entry.0 += i.rating;
                entry.1 += 1;
                local
            })
            .reduce(HashMap::new, |mut acc, local| {
                for (track_id, (sum, count)) in local {
                    let entry = acc.entry(track_id).or_insert((0.0, 0));
                    entry.0 += sum;
                    entry.1 += count;
                }
                acc
            });

        let max_count = totals.values().map(|&(_, count)| count).max().unwrap_or(1);
        let norm = (max_count as f32).ln_1p();

        let mut ranked: Vec<(TrackId, f32)> = totals
            .into_iter()
            .map(|(track_id, (sum, count))| {
                let mean = sum / count as f32;
                (track_id.to_string(), mean * (count as f32).ln_1p() / norm)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        info!("Popularity scores computed for {} tracks", ranked.len());
        self.ranked = ranked;
        self.rebuild_lookup();
        Ok(())
    }

    fn rebuild_lookup(&mut self) {
        self.scores = self.ranked.iter().cloned().collect();
    }

    pub fn score_of(&self, track_id: &str) -> Option<f32> {
        self.scores.get(track_id).copied()
    }

    /// Global top `n`
    pub fn popular_items(&self, n: usize) -> &[(TrackId, f32)] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        serde_json::to_writer(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut model: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        model.rebuild_lookup();
        Ok(model)
    }
}

impl Scorer for PopularityScorer {
    fn source(&self) -> ScoreSource {
        ScoreSource::Popularity
    }

    fn is_fitted(&self) -> bool {
        !self.ranked.is_empty()
    }

    fn score(&self, request: &ScoringRequest) -> SourceScores {
        let scored: Vec<(TrackId, f32)> = request
            .candidates
            .iter()
            .filter_map(|id| self.score_of(id).map(|s| (id.clone(), s)))
            .collect();
        keep_top(scored, request.depth)
    }
}
