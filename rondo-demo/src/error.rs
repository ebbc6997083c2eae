//! Demo error type.

use rondo_core::{ConfigError, RondoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Team construction failed: {0}")]
    Team(#[from] RondoError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Run ended without a result")]
    NoResult,
}

pub type DemoResult<T> = Result<T, DemoError>;
