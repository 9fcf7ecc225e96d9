//! Configuration file loading.
//!
//! Configuration comes from TOML at XDG-compliant locations, project-local
//! file first. Every section has working defaults, so a missing file means
//! a usable default configuration, never an error.

use crate::kernel::logging::LoggingConfig;
use crate::remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "evoplan.toml";

/// Default configuration file name within XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "evoplan";

/// Full configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvoplanConfig {
    /// Production artifact locations
    pub paths: PathsConfig,
    /// Kernel loop budgets
    pub kernel: KernelSection,
    /// Evolution budgets
    pub evolution: EvolutionSection,
    /// External planner invocation
    pub planner: PlannerSection,
    /// Logging setup
    pub logging: LoggingConfig,
    /// Remote skill server, absent when unused
    pub remote: Option<RemoteConfig>,
}

/// Where the production artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Storage root the skills operate on
    pub storage: PathBuf,
    /// Production domain text file
    pub domain: PathBuf,
    /// Regression scenario registry
    pub regressions: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage: PathBuf::from("storage"),
            domain: PathBuf::from("domain.pddl"),
            regressions: PathBuf::from("regressions.json"),
        }
    }
}

/// Kernel loop budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSection {
    /// Hard cap on plan→execute→evaluate iterations
    pub max_iterations: usize,
    /// Consecutive planner failures tolerated before giving up
    pub max_planner_failures: usize,
}

impl Default for KernelSection {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_planner_failures: 3,
        }
    }
}

/// Evolution budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionSection {
    /// Candidate attempts per capability gap
    pub max_retries: usize,
    /// Capability gaps one goal may resolve
    pub max_capability_gaps: usize,
}

impl Default for EvolutionSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_capability_gaps: 3,
        }
    }
}

/// External planner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    /// Executable to launch
    pub command: String,
    /// Fixed arguments before the domain and problem paths
    pub args: Vec<String>,
    /// Plan file the planner writes into its working directory
    pub plan_file: String,
    /// Wall-clock budget per invocation
    pub timeout_secs: u64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            command: "fast-downward".to_string(),
            args: vec!["--alias".to_string(), "lama-first".to_string()],
            plan_file: "sas_plan".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Errors that can occur loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The file involved
    pub path: PathBuf,
    /// What went wrong
    pub reason: String,
}

impl ConfigError {
    fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "configuration file '{}' could not be used: {}",
            self.path.display(),
            self.reason
        )
    }
}

impl std::error::Error for ConfigError {}

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./evoplan.toml` (project-local)
/// 2. `~/.config/evoplan/config.toml` (XDG config)
///
/// Returns the default configuration if no file is found.
///
/// # Errors
///
/// Returns [`ConfigError`] if a config file exists but cannot be parsed.
pub fn load() -> Result<EvoplanConfig, ConfigError> {
    let local_path = PathBuf::from(LOCAL_CONFIG_NAME);
    if local_path.exists() {
        return from_path(&local_path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg_path = config_dir.join(APP_NAME).join(XDG_CONFIG_NAME);
        if xdg_path.exists() {
            return from_path(&xdg_path);
        }
    }

    Ok(EvoplanConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn from_path(path: &Path) -> Result<EvoplanConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new(path, format!("failed to read: {e}")))?;
    toml::from_str(&contents)
        .map_err(|e| ConfigError::new(path, format!("failed to parse: {e}")))
}
