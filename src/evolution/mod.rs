//! Bounded synthesis and verification of missing capabilities.
//!
//! A capability gap names exactly one action the planner needed and the
//! domain lacks. The engine asks an untrusted generator for a candidate,
//! verifies it inside a sandbox (audit, integration trial, regression
//! suite), and only then promotes the action text and skill to production.
//! Every rejection reason feeds back into the next generation attempt.

pub mod regression;

pub use regression::{RegressionScenario, RegressionSuite};

use crate::audit::{AuditLayer, AuditVerdict, Auditor};
use crate::domain::{inject_action, DomainStore};
use crate::executor::Executor;
use crate::facts::{to_symbol, Fact, FactSet};
use crate::kernel::{Kernel, KernelConfig, RunStatus};
use crate::planner::{Action, Planner};
use crate::sandbox::{SandboxManager, SandboxWorkspace};
use crate::skills::{SkillHandle, SkillRegistry};
use crate::translator::{Translation, Translator};
use std::fmt;
use std::fs;

/// What the planner was missing, with the context the generator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGap {
    /// The single missing action name
    pub missing_action: String,
    /// The goal whose planning failed
    pub goal: String,
    /// The fact-set at the time of the failure
    pub facts: FactSet,
    /// Execution history up to the failure
    pub history: Vec<String>,
}

/// One synthesized capability: the declarative action text, the skill that
/// claims to implement it, and representative arguments for the physical
/// audit.
#[derive(Clone)]
pub struct Candidate {
    /// The action name, matching the skill name
    pub action_name: String,
    /// The `(:action ...)` fragment to merge into the domain
    pub action_text: String,
    /// The executable implementation
    pub skill: SkillHandle,
    /// Ground arguments the physical audit executes the skill with
    pub test_args: Vec<String>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("action_name", &self.action_name)
            .field("test_args", &self.test_args)
            .finish_non_exhaustive()
    }
}

/// Error returned by a candidate generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    /// Why no candidate could be produced
    pub reason: String,
}

impl GenerationError {
    /// Creates a generation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate generation failed: {}", self.reason)
    }
}

impl std::error::Error for GenerationError {}

/// Produces candidates for capability gaps.
///
/// Implementations are untrusted: nothing a generator returns reaches
/// production without passing the full verification pipeline.
pub trait CandidateGenerator {
    /// Generates one candidate for `gap`, considering why earlier attempts
    /// were rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if no candidate can be produced.
    fn generate(
        &self,
        gap: &CapabilityGap,
        feedback: &[String],
    ) -> Result<Candidate, GenerationError>;
}

/// Generator used when no real generator has been wired in; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerator;

impl CandidateGenerator for UnconfiguredGenerator {
    fn generate(
        &self,
        gap: &CapabilityGap,
        _feedback: &[String],
    ) -> Result<Candidate, GenerationError> {
        Err(GenerationError::new(format!(
            "no candidate generator is configured; capability '{}' cannot be synthesized",
            gap.missing_action
        )))
    }
}

/// Errors the evolution pipeline can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionError {
    /// The specific error that occurred
    pub kind: EvolutionErrorKind,
}

/// Specific evolution error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolutionErrorKind {
    /// The single sandbox slot was already taken
    SandboxBusy,
    /// The generator produced no usable candidate
    Generation {
        /// Why generation failed
        reason: String,
    },
    /// An audit layer rejected the candidate
    Audit {
        /// The first failing layer
        layer: AuditLayer,
        /// Why it failed
        reason: String,
    },
    /// The sandboxed integration trial did not genuinely use the candidate
    TrialFailed {
        /// Why the trial failed
        reason: String,
    },
    /// A recorded regression scenario stopped passing
    Regression {
        /// The failing scenario name
        scenario: String,
        /// Why it failed
        reason: String,
    },
    /// Sandbox infrastructure failed
    Sandbox {
        /// The underlying failure
        reason: String,
    },
    /// Production promotion failed
    Promotion {
        /// The underlying failure
        reason: String,
    },
    /// Every attempt was spent without an accepted candidate
    RetriesExhausted {
        /// How many attempts were made
        attempts: usize,
        /// The final attempt's failure
        last: Box<EvolutionError>,
    },
}

impl EvolutionError {
    fn new(kind: EvolutionErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a sandbox-busy error.
    #[must_use]
    pub fn sandbox_busy() -> Self {
        Self::new(EvolutionErrorKind::SandboxBusy)
    }

    /// Creates a generation error.
    #[must_use]
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::Generation {
            reason: reason.into(),
        })
    }

    /// Creates an audit rejection error.
    #[must_use]
    pub fn audit(layer: AuditLayer, reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::Audit {
            layer,
            reason: reason.into(),
        })
    }

    /// Creates a trial failure error.
    #[must_use]
    pub fn trial_failed(reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::TrialFailed {
            reason: reason.into(),
        })
    }

    /// Creates a regression failure error.
    #[must_use]
    pub fn regression(scenario: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::Regression {
            scenario: scenario.into(),
            reason: reason.into(),
        })
    }

    /// Creates a sandbox infrastructure error.
    #[must_use]
    pub fn sandbox(reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::Sandbox {
            reason: reason.into(),
        })
    }

    /// Creates a promotion error.
    #[must_use]
    pub fn promotion(reason: impl Into<String>) -> Self {
        Self::new(EvolutionErrorKind::Promotion {
            reason: reason.into(),
        })
    }

    /// Returns true if the single sandbox slot was taken.
    #[must_use]
    pub fn is_sandbox_busy(&self) -> bool {
        matches!(self.kind, EvolutionErrorKind::SandboxBusy)
    }

    /// Returns true if the retry budget was spent.
    #[must_use]
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self.kind, EvolutionErrorKind::RetriesExhausted { .. })
    }
}

impl fmt::Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EvolutionErrorKind::SandboxBusy => {
                write!(f, "an evolution trial is already running; only one may be live")
            }
            EvolutionErrorKind::Generation { reason } => {
                write!(f, "candidate generation failed: {reason}")
            }
            EvolutionErrorKind::Audit { layer, reason } => {
                write!(f, "candidate rejected at the {layer} layer: {reason}")
            }
            EvolutionErrorKind::TrialFailed { reason } => {
                write!(f, "integration trial failed: {reason}")
            }
            EvolutionErrorKind::Regression { scenario, reason } => {
                write!(f, "regression scenario '{scenario}' failed: {reason}")
            }
            EvolutionErrorKind::Sandbox { reason } => {
                write!(f, "sandbox failure during evolution: {reason}")
            }
            EvolutionErrorKind::Promotion { reason } => {
                write!(f, "promotion to production failed: {reason}")
            }
            EvolutionErrorKind::RetriesExhausted { attempts, last } => {
                write!(f, "no candidate accepted after {attempts} attempt(s); last: {last}")
            }
        }
    }
}

impl std::error::Error for EvolutionError {}

/// Everything an evolution run needs from the production side, borrowed for
/// the duration of one gap resolution.
pub struct EvolutionContext<'a> {
    /// Translator shared with the production kernel
    pub translator: &'a dyn Translator,
    /// Planner shared with the production kernel
    pub planner: &'a dyn Planner,
    /// Production skill registry, cloned per trial
    pub registry: &'a SkillRegistry,
    /// Production domain file
    pub store: &'a DomainStore,
    /// Promotion-gating scenario registry
    pub regression: &'a mut RegressionSuite,
    /// Budgets for sandboxed kernel runs
    pub config: &'a KernelConfig,
}

/// Runs the bounded generate→audit→trial→promote loop.
#[derive(Debug, Clone)]
pub struct EvolutionEngine {
    max_retries: usize,
}

impl EvolutionEngine {
    /// Creates an engine with a retry budget.
    #[must_use]
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// Resolves one capability gap, returning the accepted candidate after
    /// it has been promoted to the production domain. The caller installs
    /// the candidate's skill into the production registry.
    ///
    /// # Errors
    ///
    /// Returns [`EvolutionError`]; retryable rejections are retried with
    /// feedback until the budget runs out.
    pub fn evolve(
        &self,
        gap: &CapabilityGap,
        generator: &dyn CandidateGenerator,
        sandbox: &SandboxManager,
        ctx: &mut EvolutionContext<'_>,
    ) -> Result<Candidate, EvolutionError> {
        let mut feedback: Vec<String> = Vec::new();
        let mut last: Option<EvolutionError> = None;

        for attempt in 1..=self.max_retries {
            tracing::info!(
                action = %gap.missing_action,
                attempt,
                max = self.max_retries,
                "Evolution attempt starting"
            );

            let mut workspace = sandbox.create().map_err(|e| {
                if e.is_busy() {
                    EvolutionError::sandbox_busy()
                } else {
                    EvolutionError::sandbox(e.to_string())
                }
            })?;

            let outcome = self.run_attempt(gap, generator, sandbox, &workspace, &feedback, ctx);
            workspace.destroy();

            match outcome {
                Ok(candidate) => {
                    self.promote(gap, &candidate, ctx)?;
                    tracing::info!(
                        action = %candidate.action_name,
                        attempt,
                        "Capability evolved and promoted"
                    );
                    return Ok(candidate);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Evolution attempt rejected");
                    feedback.push(e.to_string());
                    last = Some(e);
                }
            }
        }

        let last = last.unwrap_or_else(|| EvolutionError::generation("no attempts were made"));
        Err(EvolutionError::new(EvolutionErrorKind::RetriesExhausted {
            attempts: self.max_retries,
            last: Box::new(last),
        }))
    }

    fn run_attempt(
        &self,
        gap: &CapabilityGap,
        generator: &dyn CandidateGenerator,
        sandbox: &SandboxManager,
        workspace: &SandboxWorkspace,
        feedback: &[String],
        ctx: &mut EvolutionContext<'_>,
    ) -> Result<Candidate, EvolutionError> {
        let candidate = generator
            .generate(gap, feedback)
            .map_err(|e| EvolutionError::generation(e.reason))?;

        let domain_text = workspace
            .domain_text()
            .map_err(|e| EvolutionError::sandbox(e.to_string()))?;
        let auditor = Auditor::from_domain(&domain_text);
        if let AuditVerdict::Rejected { layer, reason } = auditor.audit(&candidate, workspace) {
            return Err(EvolutionError::audit(layer, reason));
        }

        // The physical audit dirtied the jail; rebuild it before the trial.
        sandbox
            .reset_storage(workspace)
            .map_err(|e| EvolutionError::sandbox(e.to_string()))?;

        let merged = inject_action(&domain_text, &candidate.action_text)
            .map_err(|e| EvolutionError::generation(e.to_string()))?;
        workspace
            .write_domain(&merged)
            .map_err(|e| EvolutionError::sandbox(e.to_string()))?;

        let mut trial_registry = ctx.registry.clone();
        trial_registry.register(candidate.skill.clone());

        self.integration_trial(gap, &candidate, workspace, &merged, &trial_registry, ctx)?;
        self.run_regressions(sandbox, workspace, &merged, &trial_registry, ctx)?;

        Ok(candidate)
    }

    /// Runs the gap goal in the sandbox and requires the candidate action to
    /// have genuinely executed.
    fn integration_trial(
        &self,
        gap: &CapabilityGap,
        candidate: &Candidate,
        workspace: &SandboxWorkspace,
        merged_domain: &str,
        trial_registry: &SkillRegistry,
        ctx: &EvolutionContext<'_>,
    ) -> Result<(), EvolutionError> {
        let mut executor = Executor::new(trial_registry.clone(), workspace.storage_root());
        let mut facts = gap.facts.clone();
        let mark = executor.history_mark();

        let kernel = Kernel::new(ctx.translator, ctx.planner, ctx.config);
        let report = kernel.run(&gap.goal, merged_domain, &mut executor, &mut facts);

        match report.status {
            RunStatus::Satisfied => {}
            RunStatus::Failed(reason) => {
                return Err(EvolutionError::trial_failed(format!(
                    "trial run did not reach the goal: {reason}"
                )))
            }
            RunStatus::CapabilityGap(nested) => {
                return Err(EvolutionError::trial_failed(format!(
                    "trial run opened another capability gap: '{}'",
                    nested.missing_action
                )))
            }
        }

        let window = executor.history_since(mark);
        if !window.iter().any(|a| a == &candidate.action_name) {
            return Err(EvolutionError::trial_failed(format!(
                "goal was reached without executing '{}'; the capability is not genuine",
                candidate.action_name
            )));
        }
        Ok(())
    }

    /// Re-runs every recorded scenario inside the sandbox under the merged
    /// domain and trial registry.
    fn run_regressions(
        &self,
        sandbox: &SandboxManager,
        workspace: &SandboxWorkspace,
        merged_domain: &str,
        trial_registry: &SkillRegistry,
        ctx: &EvolutionContext<'_>,
    ) -> Result<(), EvolutionError> {
        for scenario in ctx.regression.scenarios() {
            sandbox
                .reset_storage(workspace)
                .map_err(|e| EvolutionError::sandbox(e.to_string()))?;

            let mut executor = Executor::new(trial_registry.clone(), workspace.storage_root());
            let mut facts = seed_facts(&mut executor);

            for literal in &scenario.setup {
                let action = parse_action(literal)
                    .map_err(|reason| EvolutionError::regression(&scenario.name, reason))?;
                executor.execute(&action, &mut facts).map_err(|e| {
                    EvolutionError::regression(
                        &scenario.name,
                        format!("setup action {literal} failed: {e}"),
                    )
                })?;
            }

            let kernel = Kernel::new(ctx.translator, ctx.planner, ctx.config);
            let report = kernel.run(&scenario.goal, merged_domain, &mut executor, &mut facts);
            if !report.status.is_satisfied() {
                return Err(EvolutionError::regression(
                    &scenario.name,
                    format!("goal '{}' no longer reachable", scenario.goal),
                ));
            }

            for literal in &scenario.expected_facts {
                let fact = Fact::parse(literal)
                    .map_err(|e| EvolutionError::regression(&scenario.name, e.to_string()))?;
                if !facts.contains(&fact) {
                    return Err(EvolutionError::regression(
                        &scenario.name,
                        format!("expected fact {fact} does not hold"),
                    ));
                }
            }
            tracing::debug!(scenario = %scenario.name, "Regression scenario passed");
        }
        Ok(())
    }

    /// Promotes the accepted candidate's action text into the production
    /// domain and records the resolved gap as a regression scenario.
    fn promote(
        &self,
        gap: &CapabilityGap,
        candidate: &Candidate,
        ctx: &mut EvolutionContext<'_>,
    ) -> Result<(), EvolutionError> {
        let production = ctx
            .store
            .load()
            .map_err(|e| EvolutionError::promotion(e.to_string()))?;
        let merged = inject_action(&production, &candidate.action_text)
            .map_err(|e| EvolutionError::promotion(e.to_string()))?;
        ctx.store
            .promote(&merged)
            .map_err(|e| EvolutionError::promotion(e.to_string()))?;

        let expected_facts = match ctx.translator.translate(&gap.goal, &gap.facts) {
            Ok(Translation::Ready(problem)) => {
                problem.goal_facts.iter().map(ToString::to_string).collect()
            }
            _ => Vec::new(),
        };
        let scenario = RegressionScenario {
            name: format!("evolved-{}", gap.missing_action),
            goal: gap.goal.clone(),
            setup: Vec::new(),
            expected_facts,
        };
        if ctx.regression.record(scenario) {
            if let Err(e) = ctx.regression.save() {
                tracing::warn!(error = %e, "Regression registry could not be saved");
            }
        }
        Ok(())
    }
}

/// Parses an action literal such as `(move file1 root backup)`.
fn parse_action(literal: &str) -> Result<Action, String> {
    let fact = Fact::parse(literal).map_err(|e| e.to_string())?;
    Ok(Action::new(fact.name(), fact.args().to_vec()))
}

/// Observes every top-level directory of the executor's storage root.
fn seed_facts(executor: &mut Executor) -> FactSet {
    let mut facts = FactSet::new();
    let Ok(entries) = fs::read_dir(executor.storage_root()) else {
        return facts;
    };
    let mut locations: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(to_symbol))
        .collect();
    locations.sort();

    for location in locations {
        let _ = executor.execute(&Action::new("scan", [location]), &mut facts);
    }
    facts
}
