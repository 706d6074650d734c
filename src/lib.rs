//! Certsweep: a resumable certificate-record harvester
//!
//! This crate enumerates a sparse numeric identifier space behind a public
//! verification endpoint, fetching each live record exactly once and
//! persisting results durably across interruptions and restarts.

pub mod config;
pub mod discovery;
pub mod harvester;
pub mod model;
pub mod ranges;
pub mod store;

use thiserror::Error;

/// Main error type for certsweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output path is not writable: {0}")]
    OutputUnwritable(String),

    #[error("Invalid range: start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Worker task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for certsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CandidateId, OutcomeKind, RangeDescriptor, Record};
pub use ranges::HarvestMode;
pub use store::HarvestStore;
