//! Long-lived session: production state plus gap resolution.
//!
//! The session owns what the kernel only borrows: the collaborators, the
//! production artifacts, the executor, and the live fact-set. `run_goal`
//! drives kernel runs and, when a run stops on a capability gap, hands the
//! gap to the evolution engine and retries with the promoted skill
//! installed. Only the first gap of each planning pass is resolved; a
//! further gap surfaces on the next pass.

use super::{FailureReason, Kernel, KernelConfig, RunReport, RunStatus};
use crate::domain::{DomainError, DomainStore};
use crate::evolution::{
    CandidateGenerator, EvolutionContext, EvolutionEngine, RegressionSuite,
};
use crate::executor::Executor;
use crate::facts::{to_symbol, FactSet};
use crate::planner::{Action, Planner};
use crate::sandbox::SandboxManager;
use crate::translator::Translator;
use std::fs;

/// Default number of capability gaps one goal may resolve.
const DEFAULT_MAX_CAPABILITY_GAPS: usize = 3;

/// Default evolution retry budget per gap.
const DEFAULT_MAX_EVOLUTION_RETRIES: usize = 3;

/// Owns production state and drives goals end to end.
pub struct Session {
    translator: Box<dyn Translator>,
    planner: Box<dyn Planner>,
    generator: Box<dyn CandidateGenerator>,
    store: DomainStore,
    sandbox: SandboxManager,
    regression: RegressionSuite,
    engine: EvolutionEngine,
    executor: Executor,
    facts: FactSet,
    config: KernelConfig,
    max_capability_gaps: usize,
}

impl Session {
    /// Creates a session with default budgets.
    #[must_use]
    pub fn new(
        translator: Box<dyn Translator>,
        planner: Box<dyn Planner>,
        generator: Box<dyn CandidateGenerator>,
        store: DomainStore,
        sandbox: SandboxManager,
        regression: RegressionSuite,
        executor: Executor,
    ) -> Self {
        Self {
            translator,
            planner,
            generator,
            store,
            sandbox,
            regression,
            engine: EvolutionEngine::new(DEFAULT_MAX_EVOLUTION_RETRIES),
            executor,
            facts: FactSet::new(),
            config: KernelConfig::default(),
            max_capability_gaps: DEFAULT_MAX_CAPABILITY_GAPS,
        }
    }

    /// Sets the kernel budgets.
    #[must_use]
    pub fn with_kernel_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the evolution retry budget per gap.
    #[must_use]
    pub fn with_evolution_retries(mut self, max_retries: usize) -> Self {
        self.engine = EvolutionEngine::new(max_retries);
        self
    }

    /// Sets how many capability gaps one goal may resolve.
    #[must_use]
    pub fn with_max_capability_gaps(mut self, max_capability_gaps: usize) -> Self {
        self.max_capability_gaps = max_capability_gaps;
        self
    }

    /// Returns the live fact-set.
    #[must_use]
    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    /// Seeds the fact-set by scanning every top-level storage directory.
    pub fn observe_storage(&mut self) {
        let Ok(entries) = fs::read_dir(self.executor.storage_root()) else {
            return;
        };
        let mut locations: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(to_symbol))
            .collect();
        locations.sort();

        for location in locations {
            let action = Action::new("scan", [location]);
            if let Err(e) = self.executor.execute(&action, &mut self.facts) {
                tracing::warn!(action = %action, error = %e, "Initial observation failed");
            }
        }
        self.executor.clear_history();
    }

    /// Runs one goal to a terminal report, resolving capability gaps along
    /// the way.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] only when the production domain text cannot
    /// be read; every goal-level failure is reported inside the
    /// [`RunReport`].
    pub fn run_goal(&mut self, goal: &str) -> Result<RunReport, DomainError> {
        let mut gaps_resolved = 0;

        loop {
            let domain = self.store.load()?;
            let kernel = Kernel::new(&*self.translator, &*self.planner, &self.config);
            let report = kernel.run(goal, &domain, &mut self.executor, &mut self.facts);

            let gap = match report.status {
                RunStatus::CapabilityGap(gap) => gap,
                _ => return Ok(report),
            };

            if gaps_resolved >= self.max_capability_gaps {
                return Ok(RunReport {
                    status: RunStatus::Failed(FailureReason::Evolution {
                        action: gap.missing_action.clone(),
                        error: crate::evolution::EvolutionError::generation(format!(
                            "capability gap budget of {} exhausted",
                            self.max_capability_gaps
                        )),
                    }),
                    iterations: report.iterations,
                    history: report.history,
                });
            }
            gaps_resolved += 1;

            let mut ctx = EvolutionContext {
                translator: &*self.translator,
                planner: &*self.planner,
                registry: self.executor.registry(),
                store: &self.store,
                regression: &mut self.regression,
                config: &self.config,
            };
            match self
                .engine
                .evolve(&gap, &*self.generator, &self.sandbox, &mut ctx)
            {
                Ok(candidate) => {
                    self.executor.registry_mut().register(candidate.skill);
                    tracing::info!(action = %gap.missing_action, "Gap resolved, re-running goal");
                }
                Err(error) => {
                    return Ok(RunReport {
                        status: RunStatus::Failed(FailureReason::Evolution {
                            action: gap.missing_action,
                            error,
                        }),
                        iterations: report.iterations,
                        history: report.history,
                    });
                }
            }
        }
    }
}
