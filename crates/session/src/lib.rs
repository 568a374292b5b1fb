//! PizzaSim Session Core
//!
//! Per-test seeded state plus the pure dispatcher that answers simulated
//! pizza-service API calls with deterministic, scripted responses.

pub mod dispatch;
pub mod seed;
pub mod state;

pub use dispatch::{dispatch, Outcome, SimRequest, SimResponse};
pub use seed::{FailureScript, SeedState};
pub use state::SessionState;
