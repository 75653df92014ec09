//! # Sources Crate
//!
//! The three per-source scorers blended into a recommendation.
//!
//! ## Components
//!
//! ### Collaborative (`NeuralCollaborativeFilter`)
//! A small MLP regressor over label-encoded `(user, track)` pairs:
//! "listeners like you rated this highly".
//!
//! ### Content (`ContentSimilarity`)
//! An item-item similarity matrix over normalized audio features:
//! "this sounds like what you liked".
//!
//! ### Popularity (`PopularityScorer`)
//! Mean rating weighted by log interaction count.
//!
//! Every scorer implements [`Scorer`]. An unfitted scorer has no opinion
//! and returns an empty map, which the blender reads as zero.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{ContentSimilarity, NeuralCollaborativeFilter, PopularityScorer, Scorer, ScoringRequest};
//!
//! let mut collaborative = NeuralCollaborativeFilter::new();
//! collaborative.fit(catalog.interactions())?;
//!
//! let mut content = ContentSimilarity::default();
//! content.fit(catalog.tracks())?;
//!
//! let request = ScoringRequest::new("listener-42", liked, pool, 20);
//! let cf_scores = collaborative.score(&request);
//! let content_scores = content.score(&request);
//! ```

pub mod collaborative;
pub mod content;
pub mod encoding;
pub mod error;
pub mod mlp;
pub mod popularity;
pub mod types;

pub use collaborative::NeuralCollaborativeFilter;
pub use content::{ContentSimilarity, SimilarityMetric};
pub use error::{ModelError, Result};
pub use mlp::{MlpConfig, MlpRegressor, TrainingSummary};
pub use popularity::PopularityScorer;
pub use types::{ScoreSource, Scorer, ScoringRequest, SourceScores};
