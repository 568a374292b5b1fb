//! PizzaSim Common Library
//!
//! Shared types and error taxonomy for the PizzaSim mock backend.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// PizzaSim version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
