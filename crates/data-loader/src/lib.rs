//! # Data Loader Crate
//!
//! Loads and indexes the music catalogue: tracks with audio analysis,
//! artists and the listener interaction log.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Track, Artist, Interaction, Recommendation, Catalog)
//! - **parser**: Parse the JSON catalogue files
//! - **index**: Build secondary indices and per-track statistics
//! - **features**: Audio feature normalization and similarity helpers
//! - **profile**: Listener profiles derived from interaction history
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{build_user_profile, Catalog};
//! use std::path::Path;
//!
//! let catalog = Catalog::load_from_dir(Path::new("data/catalog"))?;
//! let profile = build_user_profile(&catalog, "listener-42")?;
//!
//! println!("{} liked tracks, mean popularity {:.1}", profile.liked.len(), profile.avg_popularity);
//! ```

pub mod error;
pub mod features;
pub mod index;
pub mod parser;
pub mod profile;
pub mod types;

pub use error::{DataLoadError, Result};
pub use features::{
    audio_similarity, cosine_similarity, euclidean_similarity, jaccard, normalize_audio_features,
    track_features, AudioWeights, NormalizedFeatures,
};
pub use profile::{build_user_profile, FeatureStats, UserProfile, LIKED_RATING_THRESHOLD};
pub use types::{
    // Type aliases
    ArtistId,
    TrackId,
    UserId,
    // Core types
    Artist,
    AudioAttribute,
    AudioFeatures,
    Catalog,
    Interaction,
    Provenance,
    Recommendation,
    Track,
    TrackStats,
    sort_by_score,
};
