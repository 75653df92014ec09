//! # Recommendation Orchestrator
//!
//! Coordinates one recommendation request end to end:
//! 1. Resolve the listener profile and liked tracks
//! 2. Build the candidate pool
//! 3. Score the pool with all three scorers in parallel
//! 4. Blend, keeping the top N and an overflow pool
//! 5. Run the debiasing transforms
//! 6. Cache and return the final list
//!
//! Scorers are fitted once in [`RecommendationOrchestrator::new`]; a scorer
//! that fails to fit is logged and left unfitted, contributing nothing.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use data_loader::{build_user_profile, Catalog, Interaction, Recommendation, TrackId, UserId};
use evaluation::{EvaluationReport, EvaluationSummary, GroundTruth, RecommendationEvaluator};
use pipeline::transforms::{
    AdversarialDebiaser, ContextWeighter, DiversityInjector, FairnessEnforcer, ListeningContext,
    PopularityDebiaser,
};
use pipeline::{DebiasPipeline, DiversityAdjustment, Explorer, HybridBlender, TransformContext};
use sources::{
    ContentSimilarity, NeuralCollaborativeFilter, PopularityScorer, ScoreSource, Scorer,
    ScoringRequest, SourceScores,
};

use crate::cache::{CacheKey, RecommendationCache};
use crate::config::EngineConfig;

/// One call to [`RecommendationOrchestrator::get_recommendations`]
#[derive(Debug, Clone, Default)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    /// Seed tracks; the listener's liked history when empty
    pub liked: Vec<TrackId>,
    /// Explicit candidate pool; every unheard track when `None`
    pub candidates: Option<Vec<TrackId>>,
    pub limit: Option<usize>,
    pub diversity_boost: Option<f32>,
    /// Mood, activity and time of day to weight the list by
    pub context: Option<ListeningContext>,
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_liked(mut self, liked: Vec<TrackId>) -> Self {
        self.liked = liked;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<TrackId>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_diversity_boost(mut self, boost: f32) -> Self {
        self.diversity_boost = Some(boost);
        self
    }

    pub fn with_context(mut self, context: ListeningContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Hash of the request with its limit and boost resolved
    fn cache_key(&self, limit: usize, boost: f32) -> CacheKey {
        let mut hasher = DefaultHasher::new();
        self.user_id.hash(&mut hasher);
        self.liked.hash(&mut hasher);
        self.candidates.hash(&mut hasher);
        limit.hash(&mut hasher);
        boost.to_bits().hash(&mut hasher);
        self.context.hash(&mut hasher);
        hasher.finish()
    }
}

/// Main orchestrator that coordinates the recommendation pipeline
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    catalog: Arc<Catalog>,
    config: Arc<EngineConfig>,
    collaborative: Arc<NeuralCollaborativeFilter>,
    content: Arc<ContentSimilarity>,
    popularity: Arc<PopularityScorer>,
    blender: HybridBlender,
    debias_pipeline: Arc<DebiasPipeline>,
    cache: Arc<RecommendationCache>,
    evaluator: Arc<Mutex<RecommendationEvaluator>>,
}

impl RecommendationOrchestrator {
    /// Fit every scorer and the bias detector, then assemble the pipeline.
    ///
    /// Fitting runs on the blocking pool, all components at once.
    pub async fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Result<Self> {
        let start_time = Instant::now();

        let (collaborative, content, popularity, adversarial) = tokio::join!(
            tokio::task::spawn_blocking({
                let catalog = catalog.clone();
                let settings = config.collaborative.clone();
                move || {
                    let mut model = NeuralCollaborativeFilter::new()
                        .with_hidden_layers(settings.hidden_layers)
                        .with_max_iter(settings.max_iter)
                        .with_seed(settings.seed);
                    if settings.enabled {
                        if let Err(e) = model.fit(catalog.interactions()) {
                            warn!("Collaborative scorer left unfitted: {}", e);
                        }
                    }
                    model
                }
            }),
            tokio::task::spawn_blocking({
                let catalog = catalog.clone();
                let (metric, weights) = (config.similarity_metric, config.audio_weights);
                move || {
                    let mut model = ContentSimilarity::new(metric).with_weights(weights);
                    if let Err(e) = model.fit(catalog.tracks()) {
                        warn!("Content scorer left unfitted: {}", e);
                    }
                    model
                }
            }),
            tokio::task::spawn_blocking({
                let catalog = catalog.clone();
                move || {
                    let mut model = PopularityScorer::new();
                    if let Err(e) = model.fit(catalog.interactions()) {
                        warn!("Popularity scorer left unfitted: {}", e);
                    }
                    model
                }
            }),
            tokio::task::spawn_blocking({
                let catalog = catalog.clone();
                let settings = config.debiasing.clone();
                move || {
                    let mut debiaser =
                        AdversarialDebiaser::new().with_threshold(settings.bias_threshold);
                    if settings.adversarial {
                        if let Err(e) = debiaser.train_on_histories(&catalog) {
                            warn!("Bias detector left untrained: {:#}", e);
                        }
                    }
                    debiaser
                }
            })
        );

        let collaborative = collaborative.context("Collaborative fit task panicked")?;
        let content = content.context("Content fit task panicked")?;
        let popularity = popularity.context("Popularity fit task panicked")?;
        let adversarial = adversarial.context("Bias detector task panicked")?;

        let debias_pipeline = build_debias_pipeline(&config, &catalog, adversarial);
        info!(
            "Orchestrator ready in {:.2?}: transforms [{}]",
            start_time.elapsed(),
            debias_pipeline.names().join(", ")
        );

        Ok(Self {
            blender: HybridBlender::new(config.blend),
            cache: Arc::new(RecommendationCache::new(config.cache.ttl())),
            catalog,
            config: Arc::new(config),
            collaborative: Arc::new(collaborative),
            content: Arc::new(content),
            popularity: Arc::new(popularity),
            debias_pipeline: Arc::new(debias_pipeline),
            evaluator: Arc::new(Mutex::new(RecommendationEvaluator::new())),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    /// Main entry point: the final, debiased list for one request
    #[instrument(skip_all, fields(user = %request.user_id))]
    pub async fn get_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> Result<Vec<Recommendation>> {
        let start_time = Instant::now();
        let settings = &self.config.recommendation;

        let limit = request
            .limit
            .unwrap_or(settings.default_count)
            .min(settings.max_count);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let boost = request.diversity_boost.unwrap_or(settings.diversity_boost);
        ensure!(
            (0.0..=1.0).contains(&boost),
            "diversity boost must be within [0, 1], got {}",
            boost
        );

        let key = request.cache_key(limit, boost);
        if self.config.cache.enabled {
            if let Some(cached) = self.cache.get(key) {
                debug!("Cache hit for user {}", request.user_id);
                return Ok(cached);
            }
        }

        // Unknown listeners simply have no profile
        let profile = build_user_profile(&self.catalog, &request.user_id).ok();
        let liked = if request.liked.is_empty() {
            profile.as_ref().map(|p| p.liked.clone()).unwrap_or_default()
        } else {
            request.liked.clone()
        };

        let pool = match &request.candidates {
            Some(candidates) => candidates.clone(),
            None => self.default_pool(profile.as_ref().map(|p| &p.listened), &liked),
        };
        info!(
            "Scoring {} candidates for user {} ({} liked)",
            pool.len(),
            request.user_id,
            liked.len()
        );

        let scoring_request = Arc::new(ScoringRequest::new(
            request.user_id.clone(),
            liked,
            pool,
            limit * 2,
        ));
        let source_scores = self.score_parallel(scoring_request.clone()).await?;

        let adjustment = profile.as_ref().map(|profile| DiversityAdjustment {
            profile,
            catalog: &self.catalog,
            boost,
        });
        let blended = self.blender.blend_all(
            &scoring_request.candidates,
            &source_scores,
            adjustment.as_ref(),
        );
        let (top, overflow) = blended.split_at(limit.min(blended.len()));

        let context = TransformContext::new(&self.catalog)
            .with_profile(profile.as_ref())
            .with_candidates(overflow)
            .with_listening(request.context.as_ref());
        let mut recommendations = self
            .debias_pipeline
            .apply(top.to_vec(), &context)
            .context("Failed to apply debiasing transforms")?;
        recommendations.truncate(limit);

        if self.config.cache.enabled {
            self.cache.insert(key, recommendations.clone());
        }
        info!(
            "Returned {} recommendations for user {} in {:.2?}",
            recommendations.len(),
            request.user_id,
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Every catalogue track the listener has neither heard nor seeded with
    fn default_pool(&self, listened: Option<&HashSet<TrackId>>, liked: &[TrackId]) -> Vec<TrackId> {
        let liked: HashSet<&str> = liked.iter().map(String::as_str).collect();
        self.catalog
            .all_track_ids()
            .into_iter()
            .filter(|id| !liked.contains(id.as_str()))
            .filter(|id| listened.is_none_or(|heard| !heard.contains(id)))
            .collect()
    }

    /// Run the three scorers on the blocking pool. Results come back in a
    /// fixed order so blending is deterministic.
    async fn score_parallel(
        &self,
        request: Arc<ScoringRequest>,
    ) -> Result<Vec<(ScoreSource, SourceScores)>> {
        let (collaborative, content, popularity) = tokio::join!(
            score_blocking(self.collaborative.clone(), request.clone()),
            score_blocking(self.content.clone(), request.clone()),
            score_blocking(self.popularity.clone(), request)
        );

        let scores = vec![
            collaborative.context("Collaborative scoring task panicked")?,
            content.context("Content scoring task panicked")?,
            popularity.context("Popularity scoring task panicked")?,
        ];
        for (source, opinions) in &scores {
            debug!("{:?} scored {} candidates", source, opinions.len());
        }
        Ok(scores)
    }

    /// Content-similar tracks, best first
    pub fn similar_tracks(&self, track_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        let similar = self
            .content
            .similar_items(track_id, n)
            .with_context(|| format!("No similar tracks for {}", track_id))?;

        Ok(similar
            .into_iter()
            .map(|(id, similarity)| {
                let mut rec = Recommendation::new(id, similarity);
                rec.provenance.content = similarity;
                rec
            })
            .collect())
    }

    fn evaluator(&self) -> MutexGuard<'_, RecommendationEvaluator> {
        self.evaluator.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Evaluate a finished list and record it in the evaluation history
    pub fn evaluate(
        &self,
        recommendations: &[Recommendation],
        ground_truth: &[GroundTruth],
        user_id: Option<&str>,
    ) -> EvaluationReport {
        let profile = user_id.and_then(|id| build_user_profile(&self.catalog, id).ok());
        self.evaluator()
            .evaluate(recommendations, ground_truth, &self.catalog, profile.as_ref())
    }

    /// Hold out the most recent `holdout_fraction` of the listener's liked
    /// tracks, recommend from the rest, and score the list against them
    pub async fn evaluate_holdout(
        &self,
        user_id: &str,
        limit: usize,
        holdout_fraction: f32,
    ) -> Result<EvaluationReport> {
        ensure!(
            holdout_fraction > 0.0 && holdout_fraction < 1.0,
            "holdout fraction must be within (0, 1), got {}",
            holdout_fraction
        );
        let profile = build_user_profile(&self.catalog, user_id)
            .with_context(|| format!("Cannot evaluate user {}", user_id))?;
        let liked = liked_oldest_first(self.catalog.get_user_interactions(user_id), &profile.liked);
        ensure!(
            liked.len() >= 2,
            "user {} has {} liked tracks, need at least 2 to hold some out",
            user_id,
            liked.len()
        );

        let held_count = ((liked.len() as f32 * holdout_fraction).round() as usize)
            .clamp(1, liked.len() - 1);
        let (input, held_out) = liked.split_at(liked.len() - held_count);

        let held: HashSet<&str> = held_out.iter().map(String::as_str).collect();
        let candidates: Vec<TrackId> = self
            .catalog
            .all_track_ids()
            .into_iter()
            .filter(|id| held.contains(id.as_str()) || !profile.listened.contains(id))
            .collect();

        let request = RecommendationRequest::new(user_id)
            .with_liked(input.to_vec())
            .with_candidates(candidates)
            .with_limit(limit);
        let recommendations = self.get_recommendations(request).await?;

        let ground_truth: Vec<GroundTruth> = held_out.iter().map(GroundTruth::new).collect();
        info!(
            "Evaluating {} recommendations for user {} against {} held-out tracks",
            recommendations.len(),
            user_id,
            ground_truth.len()
        );
        Ok(self.evaluate(&recommendations, &ground_truth, Some(user_id)))
    }

    pub fn evaluation_summary(&self, n_recent: usize) -> Option<EvaluationSummary> {
        self.evaluator().evaluation_summary(n_recent)
    }
}

/// Liked tracks ordered by when they were last played, oldest first.
/// Untimestamped plays sort ahead of timestamped ones, in log order.
fn liked_oldest_first(interactions: &[Interaction], liked: &[TrackId]) -> Vec<TrackId> {
    let mut last_played: HashMap<&str, i64> = HashMap::new();
    for interaction in interactions {
        if let Some(timestamp) = interaction.timestamp {
            last_played
                .entry(interaction.track_id.as_str())
                .and_modify(|t| *t = (*t).max(timestamp))
                .or_insert(timestamp);
        }
    }

    let mut ordered = liked.to_vec();
    ordered.sort_by_key(|id| last_played.get(id.as_str()).copied());
    ordered
}

fn score_blocking(
    scorer: Arc<dyn Scorer>,
    request: Arc<ScoringRequest>,
) -> JoinHandle<(ScoreSource, SourceScores)> {
    tokio::task::spawn_blocking(move || (scorer.source(), scorer.score(&request)))
}

/// Transforms in a fixed order: penalty, fairness, injection, adversarial,
/// context weighting, then exploration when enabled
fn build_debias_pipeline(
    config: &EngineConfig,
    catalog: &Catalog,
    adversarial: AdversarialDebiaser,
) -> DebiasPipeline {
    let settings = &config.debiasing;
    let mut pipeline = DebiasPipeline::new();

    if settings.popularity_penalty {
        pipeline = pipeline.add_transform(PopularityDebiaser::fit(settings.penalty_strength, catalog));
    }
    if settings.fairness {
        pipeline = pipeline.add_transform(
            FairnessEnforcer::new()
                .with_min_niche_ratio(settings.min_niche_ratio)
                .with_min_diverse_genres(settings.min_diverse_genres),
        );
    }
    if settings.diversity_injection {
        pipeline = pipeline.add_transform(DiversityInjector::new(settings.injection_rate));
    }
    if settings.adversarial && adversarial.is_trained() {
        pipeline = pipeline.add_transform(adversarial);
    }
    // Identity unless the request carries a listening context
    pipeline = pipeline.add_transform(ContextWeighter::new());

    let exploration = &config.exploration;
    if exploration.enabled {
        let mut explorer = Explorer::new(exploration.strategy());
        if let Some(seed) = exploration.seed {
            explorer = explorer.with_seed(seed);
        }
        pipeline = pipeline.add_transform(explorer);
    }
    pipeline
}
