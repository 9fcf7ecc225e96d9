//! Subprocess adapter for an external planner binary.
//!
//! Writes the domain and problem to a private temp directory, launches the
//! configured command with both paths appended, polls it under a wall-clock
//! budget, and classifies the outcome from the plan file and the process
//! output.

use super::{Action, Plan, PlanError, Planner};
use regex::Regex;
use std::fs;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Default plan file name the external planner writes into its working
/// directory.
const DEFAULT_PLAN_FILE: &str = "sas_plan";

/// Poll interval while waiting for the planner process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives an external planner binary over the filesystem.
#[derive(Debug, Clone)]
pub struct SubprocessPlanner {
    command: String,
    args: Vec<String>,
    plan_file: String,
    timeout_secs: u64,
}

impl SubprocessPlanner {
    /// Creates a planner around an executable command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            plan_file: DEFAULT_PLAN_FILE.to_string(),
            timeout_secs: 30,
        }
    }

    /// Sets fixed arguments passed before the domain and problem paths.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the plan file name the planner writes.
    #[must_use]
    pub fn with_plan_file(mut self, plan_file: impl Into<String>) -> Self {
        self.plan_file = plan_file.into();
        self
    }

    /// Sets the wall-clock budget for one invocation.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn classify_failure(&self, stdout: &str, stderr: &str) -> PlanError {
        let combined = format!("{stdout}\n{stderr}");
        let lower = combined.to_lowercase();

        if lower.contains("syntax error") || lower.contains("parse error") {
            return PlanError::syntax(first_line(&combined));
        }

        // Undeclared-action diagnostics name the capability the problem
        // needs but the domain lacks.
        if let Some(action) = extract_missing_action(&combined) {
            return PlanError::unsolvable(Some(action), first_line(&combined));
        }

        if lower.contains("search stopped without finding a solution")
            || lower.contains("unsolvable")
            || lower.contains("no solution")
        {
            return PlanError::unsolvable(None, first_line(&combined));
        }

        PlanError::invocation(first_line(&combined))
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string()
}

/// Pulls a missing capability name out of a planner diagnostic such as
/// `undeclared action "rename"` or `unknown action name (rename)`.
fn extract_missing_action(diagnostic: &str) -> Option<String> {
    let pattern = Regex::new(
        r#"(?i)(?:undeclared|undefined|unknown)\s+(?:action|operator)(?:\s+name)?\s*[:"(']?\s*([a-z][a-z0-9_-]*)"#,
    )
    .ok()?;
    pattern
        .captures(diagnostic)
        .map(|c| c[1].to_lowercase())
}

/// Parses plan-file lines of the form `(name arg1 arg2 ...)`.
fn parse_plan_text(text: &str) -> Plan {
    let line = Regex::new(r"(?m)^\s*\(([a-z][a-z0-9_-]*)((?:\s+[^\s()]+)*)\s*\)")
        .unwrap_or_else(|_| unreachable!("plan line pattern is valid"));

    let actions = line
        .captures_iter(&text.to_lowercase())
        .map(|caps| {
            let args = caps[2]
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>();
            Action::new(&caps[1], args)
        })
        .collect();
    Plan::new(actions)
}

impl Planner for SubprocessPlanner {
    fn plan(&self, domain: &str, problem: &str) -> Result<Plan, PlanError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| PlanError::invocation(format!("cannot create work directory: {e}")))?;

        let domain_path = workdir.path().join("domain.pddl");
        let problem_path = workdir.path().join("problem.pddl");
        fs::write(&domain_path, domain)
            .map_err(|e| PlanError::invocation(format!("cannot write domain file: {e}")))?;
        fs::write(&problem_path, problem)
            .map_err(|e| PlanError::invocation(format!("cannot write problem file: {e}")))?;

        tracing::debug!(command = %self.command, "Invoking planner");
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(&domain_path)
            .arg(&problem_path)
            .current_dir(workdir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PlanError::invocation(format!("cannot launch '{}': {e}", self.command)))?;

        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::warn!(limit_secs = self.timeout_secs, "Planner timed out");
                        return Err(PlanError::timeout(self.timeout_secs));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(PlanError::invocation(format!(
                        "cannot wait on planner process: {e}"
                    )))
                }
            }
        };

        let output = child
            .wait_with_output()
            .map_err(|e| PlanError::invocation(format!("cannot read planner output: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let plan_path = workdir.path().join(&self.plan_file);
        if status.success() && plan_path.is_file() {
            let text = fs::read_to_string(&plan_path)
                .map_err(|e| PlanError::invocation(format!("cannot read plan file: {e}")))?;
            let plan = parse_plan_text(&text);
            tracing::info!(steps = plan.len(), "Planner produced a plan");
            return Ok(plan);
        }

        // Some planners print "Solution found." and the plan only on stdout.
        if stdout.contains("Solution found.") {
            let plan = parse_plan_text(&stdout);
            if !plan.is_empty() {
                return Ok(plan);
            }
        }

        Err(self.classify_failure(&stdout, &stderr))
    }
}
