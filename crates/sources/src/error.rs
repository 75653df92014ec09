//! Error types for the scoring models.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    /// Prediction or lookup attempted before `fit`
    #[error("{model} has not been fitted")]
    NotFitted { model: &'static str },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Not enough training data to fit the model
    #[error("Insufficient data to fit {model}: {reason}")]
    InsufficientData { model: &'static str, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training failed: {0}")]
    Training(#[from] aprender::AprenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
