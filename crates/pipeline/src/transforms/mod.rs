//! Debiasing transforms applied after blending.

pub mod adversarial;
pub mod context;
pub mod diversity_injection;
pub mod fairness;
pub mod popularity_penalty;

pub use adversarial::{AdversarialDebiaser, BiasDetector, DetectorSummary};
pub use context::{Activity, ContextWeighter, ListeningContext, Mood, TimeOfDay};
pub use diversity_injection::DiversityInjector;
pub use fairness::{ArtistTier, FairnessEnforcer, FairnessMetrics, FairnessViolation};
pub use popularity_penalty::{PopularityDebiaser, PopularityStats};
