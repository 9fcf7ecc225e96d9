//! Persistent regression scenarios gating every promotion.
//!
//! Each resolved capability gap leaves a scenario behind; later promotions
//! must keep every recorded scenario passing inside the sandbox before they
//! reach production. Scenarios are persisted as JSON and deduplicated by
//! goal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One recorded scenario: a goal that must stay solvable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionScenario {
    /// Human-readable scenario name
    pub name: String,
    /// The goal to run
    pub goal: String,
    /// Action literals executed before the run, e.g. `(move file1 root backup)`
    #[serde(default)]
    pub setup: Vec<String>,
    /// Fact literals that must hold afterwards
    #[serde(default)]
    pub expected_facts: Vec<String>,
}

/// Error reading or writing the scenario registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressionStoreError {
    /// What was being done
    pub context: String,
    /// The underlying failure
    pub reason: String,
}

impl RegressionStoreError {
    fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RegressionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "regression registry failure while {}: {}",
            self.context, self.reason
        )
    }
}

impl std::error::Error for RegressionStoreError {}

/// The scenario registry, backed by one JSON file.
#[derive(Debug, Clone)]
pub struct RegressionSuite {
    path: PathBuf,
    scenarios: Vec<RegressionScenario>,
}

impl RegressionSuite {
    /// Loads the registry, starting empty if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionStoreError`] if an existing file cannot be read
    /// or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegressionStoreError> {
        let path = path.into();
        let scenarios = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| RegressionStoreError::new("reading registry", e.to_string()))?;
            serde_json::from_str(&text)
                .map_err(|e| RegressionStoreError::new("parsing registry", e.to_string()))?
        } else {
            Vec::new()
        };
        Ok(Self { path, scenarios })
    }

    /// Returns the registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the recorded scenarios, oldest first.
    #[must_use]
    pub fn scenarios(&self) -> &[RegressionScenario] {
        &self.scenarios
    }

    /// Records a scenario unless one with the same goal already exists.
    /// Returns true if the scenario was added.
    pub fn record(&mut self, scenario: RegressionScenario) -> bool {
        if self.scenarios.iter().any(|s| s.goal == scenario.goal) {
            tracing::debug!(goal = %scenario.goal, "Scenario already recorded, skipped");
            return false;
        }
        tracing::info!(name = %scenario.name, goal = %scenario.goal, "Scenario recorded");
        self.scenarios.push(scenario);
        true
    }

    /// Persists the registry as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RegressionStoreError`] if the file cannot be written.
    pub fn save(&self) -> Result<(), RegressionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RegressionStoreError::new("creating registry directory", e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&self.scenarios)
            .map_err(|e| RegressionStoreError::new("serializing registry", e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| RegressionStoreError::new("writing registry", e.to_string()))
    }
}
