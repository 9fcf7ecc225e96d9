//! The fact-state kernel: plan, execute, evaluate.
//!
//! The kernel owns nothing long-lived; it borrows its collaborators and
//! drives one goal to a terminal status. Planning failures attributable to a
//! single named missing capability surface as a capability gap for the
//! session to resolve; everything else terminates the run with a typed
//! failure plus the full execution history.

pub mod logging;
pub mod session;

pub use session::Session;

use crate::evolution::{CapabilityGap, EvolutionError};
use crate::executor::Executor;
use crate::facts::FactSet;
use crate::planner::{PlanError, Planner};
use crate::translator::{Translation, TranslationError, Translator};
use std::fmt;

/// Budgets for one kernel run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Hard cap on plan→execute→evaluate iterations
    pub max_iterations: usize,
    /// Consecutive planner failures tolerated before giving up
    pub max_planner_failures: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_planner_failures: 3,
        }
    }
}

impl KernelConfig {
    /// Creates a config with default budgets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the consecutive planner failure budget.
    #[must_use]
    pub fn with_max_planner_failures(mut self, max_planner_failures: usize) -> Self {
        self.max_planner_failures = max_planner_failures;
        self
    }
}

/// Why a run terminated without satisfying its goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The iteration budget ran out before the goal held
    IterationBudgetExhausted {
        /// The configured budget
        limit: usize,
    },
    /// The planner failed repeatedly without naming a missing capability
    PlannerFailures {
        /// How many consecutive failures occurred
        consecutive: usize,
        /// The final failure
        last: PlanError,
    },
    /// The goal could not be grounded
    Translation(TranslationError),
    /// A capability gap was found but evolution could not close it
    Evolution {
        /// The missing capability
        action: String,
        /// Why evolution failed
        error: EvolutionError,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationBudgetExhausted { limit } => {
                write!(f, "goal not reached within {limit} iterations")
            }
            Self::PlannerFailures { consecutive, last } => {
                write!(f, "planner failed {consecutive} times in a row; last: {last}")
            }
            Self::Translation(e) => write!(f, "goal translation failed: {e}"),
            Self::Evolution { action, error } => {
                write!(f, "capability '{action}' could not be evolved: {error}")
            }
        }
    }
}

/// Terminal status of one kernel run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The goal holds in the fact-set
    Satisfied,
    /// The run terminated without reaching the goal
    Failed(FailureReason),
    /// Planning is blocked on one named missing capability
    CapabilityGap(CapabilityGap),
}

impl RunStatus {
    /// Returns true if the goal was reached.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Terminal status plus the evidence of how the run got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// How the run ended
    pub status: RunStatus,
    /// Plan→execute→evaluate iterations consumed
    pub iterations: usize,
    /// Action names dispatched during the run, oldest first
    pub history: Vec<String>,
}

/// Drives one goal through the plan→execute→evaluate loop.
pub struct Kernel<'a> {
    translator: &'a dyn Translator,
    planner: &'a dyn Planner,
    config: &'a KernelConfig,
}

impl<'a> Kernel<'a> {
    /// Creates a kernel over borrowed collaborators.
    #[must_use]
    pub fn new(
        translator: &'a dyn Translator,
        planner: &'a dyn Planner,
        config: &'a KernelConfig,
    ) -> Self {
        Self {
            translator,
            planner,
            config,
        }
    }

    /// Runs `goal` to a terminal status, mutating `facts` through the
    /// executor as actions succeed. Committed fact changes are never rolled
    /// back, whatever the terminal status.
    pub fn run(
        &self,
        goal: &str,
        domain: &str,
        executor: &mut Executor,
        facts: &mut FactSet,
    ) -> RunReport {
        let start = executor.history_mark();
        let mut iterations = 0;
        let mut consecutive_failures = 0;

        let status = loop {
            if iterations >= self.config.max_iterations {
                tracing::warn!(limit = self.config.max_iterations, "Iteration budget exhausted");
                break RunStatus::Failed(FailureReason::IterationBudgetExhausted {
                    limit: self.config.max_iterations,
                });
            }
            iterations += 1;
            tracing::debug!(iteration = iterations, goal = %goal, "Planning");

            let problem = match self.translator.translate(goal, facts) {
                Ok(Translation::AlreadySatisfied) => break RunStatus::Satisfied,
                Ok(Translation::Ready(problem)) => problem,
                Err(e) => break RunStatus::Failed(FailureReason::Translation(e)),
            };

            // The translator's satisfied check covers fresh goals; this one
            // catches goals reached mid-run by earlier iterations.
            if problem.satisfied_by(facts) {
                break RunStatus::Satisfied;
            }

            let plan = match self.planner.plan(domain, &problem.text) {
                Ok(plan) => {
                    consecutive_failures = 0;
                    plan
                }
                Err(e) => {
                    if let Some(action) = e.missing_action() {
                        tracing::info!(action = %action, "Capability gap detected");
                        break RunStatus::CapabilityGap(CapabilityGap {
                            missing_action: action.to_string(),
                            goal: goal.to_string(),
                            facts: facts.clone(),
                            history: executor.history().to_vec(),
                        });
                    }
                    consecutive_failures += 1;
                    tracing::warn!(consecutive = consecutive_failures, error = %e, "Planner failed");
                    if consecutive_failures >= self.config.max_planner_failures {
                        break RunStatus::Failed(FailureReason::PlannerFailures {
                            consecutive: consecutive_failures,
                            last: e,
                        });
                    }
                    continue;
                }
            };

            if plan.is_empty() {
                break RunStatus::Satisfied;
            }

            // First failure aborts the rest of the plan; committed fact
            // changes stay and the next iteration re-plans from them.
            for action in plan.actions() {
                if let Err(e) = executor.execute(action, facts) {
                    tracing::warn!(action = %action, error = %e, "Plan aborted mid-execution");
                    break;
                }
            }
        };

        let history = executor.history_since(start).to_vec();
        tracing::info!(
            satisfied = status.is_satisfied(),
            iterations,
            actions = history.len(),
            "Kernel run finished"
        );
        RunReport {
            status,
            iterations,
            history,
        }
    }
}
