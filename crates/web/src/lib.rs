//! PizzaSim Web Surface
//!
//! Serves the session dispatcher over HTTP so a real browser or test
//! client can exercise the simulated pizza-service API.

pub mod proxy;
pub mod server;

pub use server::{SimServer, SimServerConfig};
