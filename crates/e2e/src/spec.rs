//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use pizzasim_session::SeedState;

use crate::error::{HarnessError, HarnessResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Session seed installed before the first step
    #[serde(default)]
    pub seed: SeedState,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

/// A single request plus its expectations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub method: String,
    pub path: String,

    /// JSON body to send, if any
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub expect: Expectations,
}

/// What a step's response must look like
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectations {
    /// Expected HTTP status code
    #[serde(default)]
    pub status: Option<u16>,

    /// Substring the raw response body must contain
    #[serde(default)]
    pub body_contains: Option<String>,

    /// JSON pointer assertions against the response body
    #[serde(default)]
    pub json: Vec<JsonAssertion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAssertion {
    /// RFC 6901 pointer, e.g. `/user/email`
    pub pointer: String,
    pub equals: Value,
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.contains(&tag.to_string())).collect()
    }
}
