//! Error types for PizzaSim

use thiserror::Error;

/// Result type alias using PizzaSim Error
pub type Result<T> = std::result::Result<T, Error>;

/// PizzaSim error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),
}
