//! Server crate for the TuneRecs recommendation engine.
//!
//! This crate contains the engine configuration, the session cache and the
//! orchestrator that coordinates scoring, blending, debiasing and
//! evaluation.

pub mod cache;
pub mod config;
pub mod orchestrator;

pub use cache::{RecommendationCache, TtlCache};
pub use config::{ConfigError, EngineConfig, ExplorationKind};
pub use orchestrator::{RecommendationOrchestrator, RecommendationRequest};
pub use pipeline::transforms::{Activity, ListeningContext, Mood, TimeOfDay};
