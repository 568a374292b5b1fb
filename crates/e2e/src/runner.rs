//! Runs scenario specs against a fresh fixture per scenario

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{HarnessError, HarnessResult};
use crate::fixture::Scenario;
use crate::spec::{Expectations, ScenarioSpec, ScenarioStep};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of a single step's request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Drives scenario specs end to end.
///
/// Every scenario gets its own freshly seeded surface, so scenarios
/// never observe each other's state.
pub struct ScenarioRunner {
    specs_dir: PathBuf,
}

impl ScenarioRunner {
    pub fn new(specs_dir: impl Into<PathBuf>) -> Self {
        Self {
            specs_dir: specs_dir.into(),
        }
    }

    pub fn specs_dir(&self) -> &Path {
        &self.specs_dir
    }

    /// Run every scenario in the specs directory
    pub async fn run_all(&self) -> HarnessResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> HarnessResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<ScenarioSpec> = specs
            .into_iter()
            .filter(|s| s.tags.contains(&tag.to_string()))
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> HarnessResult<ScenarioResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| HarnessError::SpecParse(format!("Scenario not found: {}", name)))?;

        self.run_scenario(&spec).await
    }

    /// Run a list of scenario specs
    pub async fn run_specs(&self, specs: &[ScenarioSpec]) -> HarnessResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            match self.run_scenario(spec).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", spec.name, e);
                    results.push(ScenarioResult {
                        name: spec.name.clone(),
                        success: false,
                        duration_ms: 0,
                        steps: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteResult {
            total: specs.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario spec on its own fixture
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> HarnessResult<ScenarioResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let handle = Scenario::seeded(spec.seed.clone()).install().await?;
        let client = handle.client()?;

        let mut step_results = Vec::new();
        let mut scenario_error: Option<String> = None;

        for step in &spec.steps {
            let result = execute_step(&client, &handle.url(&step.path), step).await?;

            if !result.success {
                scenario_error = result.error.clone();
                step_results.push(result);
                break;
            }

            step_results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = scenario_error.is_none();

        Ok(ScenarioResult {
            name: spec.name.clone(),
            success,
            duration_ms,
            steps: step_results,
            error: scenario_error,
        })
    }
}

async fn execute_step(
    client: &reqwest::Client,
    url: &str,
    step: &ScenarioStep,
) -> HarnessResult<StepResult> {
    let method = reqwest::Method::from_bytes(step.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| HarnessError::StepFailed {
            step: format!("{} {}", step.method, step.path),
            reason: "unsupported method".to_string(),
        })?;

    let mut request = client.request(method, url);
    if let Some(body) = &step.body {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let text = response.text().await?;

    let error = check_expectations(&step.expect, status, &text);
    Ok(StepResult {
        method: step.method.clone(),
        path: step.path.clone(),
        status,
        success: error.is_none(),
        error,
    })
}

fn check_expectations(expect: &Expectations, status: u16, body: &str) -> Option<String> {
    if let Some(want) = expect.status {
        if status != want {
            return Some(format!("expected status {}, got {}: {}", want, status, body));
        }
    }

    if let Some(needle) = &expect.body_contains {
        if !body.contains(needle.as_str()) {
            return Some(format!("body does not contain {:?}: {}", needle, body));
        }
    }

    if !expect.json.is_empty() {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => return Some(format!("body is not JSON ({}): {}", e, body)),
        };
        for assertion in &expect.json {
            match value.pointer(&assertion.pointer) {
                Some(found) if *found == assertion.equals => {}
                Some(found) => {
                    return Some(format!(
                        "{} is {}, expected {}",
                        assertion.pointer, found, assertion.equals
                    ));
                }
                None => return Some(format!("{} missing from {}", assertion.pointer, value)),
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::JsonAssertion;
    use serde_json::json;

    fn expectations(status: Option<u16>, pointer: &str, equals: Value) -> Expectations {
        Expectations {
            status,
            body_contains: None,
            json: vec![JsonAssertion {
                pointer: pointer.to_string(),
                equals,
            }],
        }
    }

    #[test]
    fn status_mismatch_is_reported() {
        let expect = Expectations {
            status: Some(200),
            ..Default::default()
        };
        let error = check_expectations(&expect, 401, r#"{"message":"unauthorized"}"#);
        assert!(error.unwrap().contains("expected status 200"));
    }

    #[test]
    fn json_pointer_assertions_compare_values() {
        let expect = expectations(Some(200), "/user/email", json!("a@jwt.com"));
        let body = json!({ "user": { "email": "a@jwt.com" }, "token": "t" }).to_string();
        assert!(check_expectations(&expect, 200, &body).is_none());

        let wrong = json!({ "user": { "email": "other@jwt.com" } }).to_string();
        assert!(check_expectations(&expect, 200, &wrong).is_some());
    }

    #[test]
    fn missing_pointer_is_an_error() {
        let expect = expectations(None, "/token", json!("t"));
        assert!(check_expectations(&expect, 200, "{}").is_some());
    }

    #[test]
    fn body_contains_checks_raw_text() {
        let expect = Expectations {
            status: None,
            body_contains: Some("logout successful".to_string()),
            json: vec![],
        };
        assert!(check_expectations(&expect, 200, r#"{"message":"logout successful"}"#).is_none());
        assert!(check_expectations(&expect, 200, "{}").is_some());
    }
}
