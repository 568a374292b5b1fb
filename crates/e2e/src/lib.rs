//! PizzaSim Scenario Harness
//!
//! This crate drives the simulator surface end to end:
//! - Installs a seeded session and serves it on an ephemeral port
//! - Drives the surface with a real HTTP client
//! - Parses declarative YAML scenario specs
//! - Reports per-step and per-scenario results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── install fixture -> SessionHandle                     │
//! │    ├── execute steps   -> StepResult                        │
//! │    └── summarize       -> SuiteResult                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML)                                        │
//! │    ├── name, description, tags                              │
//! │    ├── seed: SeedState                                      │
//! │    └── steps: [Step]                                        │
//! │          ├── method, path, body                             │
//! │          └── expect { status?, body_contains?, json }       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fixture;
pub mod runner;
pub mod spec;

pub use error::{HarnessError, HarnessResult};
pub use fixture::{Scenario, SessionHandle};
pub use runner::ScenarioRunner;
pub use spec::{ScenarioSpec, ScenarioStep};
