//! # Evaluation Crate
//!
//! Descriptive statistics over a finished recommendation list:
//! accuracy against held-out ground truth, diversity, novelty, coverage,
//! concentration bias and serendipity, rolled into one quality score.
//!
//! ## Example Usage
//!
//! ```ignore
//! use evaluation::{GroundTruth, RecommendationEvaluator};
//!
//! let mut evaluator = RecommendationEvaluator::new();
//! let truth = vec![GroundTruth::new("track-17")];
//! let report = evaluator.evaluate(&recommendations, &truth, &catalog, profile.as_ref());
//! println!("{}", report.to_json_pretty()?);
//!
//! let summary = evaluator.evaluation_summary(10);
//! ```

pub mod evaluator;
pub mod metrics;
pub mod report;

pub use evaluator::{GroundTruth, RecommendationEvaluator, NDCG_K};
pub use metrics::{gini, intra_list_diversity, linear_trend, ndcg_at_k, shannon_entropy};
pub use report::{
    AccuracyMetrics, ArtistDiversity, BiasMetrics, CoverageMetrics, DiversityMetrics,
    EvaluationReport, EvaluationSummary, GenreDiversity, NoveltyMetrics, PopularityDiversity,
    PopularityTierCoverage, QualityComponents, QualityScore, QualityWeights, SerendipityMetrics,
    TemporalDiversity,
};
