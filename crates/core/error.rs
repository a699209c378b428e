//! Error type shared by every geopin component.

use geopin_types::TypeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeopinError>;

#[derive(Error, Debug)]
pub enum GeopinError {
    /// Bad coordinates, radius or request shape. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid service configuration, fatal at setup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A routing, POI or geocoding provider call failed.
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Degenerate bounding box or polygon math failure.
    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The webhook queue was shut down.
    #[error("Service closed")]
    Closed,
}

impl GeopinError {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller supplied bad input (as opposed to a runtime failure).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<TypeError> for GeopinError {
    fn from(err: TypeError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
