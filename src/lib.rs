//! # Evoplan: a self-evolving symbolic task kernel
//!
//! Evoplan executes file-management goals by translating them into planning
//! problems, obtaining action sequences from a symbolic planner, and
//! executing them against a tracked fact-set. When the planner lacks a
//! capability, the evolution engine synthesizes one, verifies it inside an
//! isolated sandbox through a three-layer audit, an integration trial, and
//! a regression gate, and only then promotes it to production.
//!
//! ## Architecture
//!
//! - **Kernel**: drives the plan→execute→evaluate loop over the fact-set
//! - **Translator**: grounds a goal into a planning problem
//! - **Planner**: black-box symbolic planner behind a typed contract
//! - **Executor**: dispatches actions to registered skills
//! - **Evolution Engine**: bounded synthesis of missing capabilities
//! - **Sandbox Manager**: one disjoint copy of production state per trial
//! - **Auditor**: syntax, static alignment, physical alignment
//! - **Domain Store**: production artifacts, mutated only on promotion
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use evoplan::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = evoplan::config::load()?;
//!     let mut session = /* wire components from config */;
//!     session.observe_storage();
//!     let report = session.run_goal("move report.txt from inbox to archive")?;
//!     println!("{:?}", report.status);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod domain;
pub mod evolution;
pub mod executor;
pub mod facts;
pub mod kernel;
pub mod planner;
pub mod remote;
pub mod sandbox;
pub mod skills;
pub mod translator;

/// Common imports for embedding the kernel.
pub mod prelude {
    pub use crate::audit::{AuditLayer, AuditVerdict, Auditor};
    pub use crate::domain::{DomainStore, DEFAULT_DOMAIN};
    pub use crate::evolution::{
        Candidate, CandidateGenerator, CapabilityGap, EvolutionEngine, EvolutionError,
        RegressionScenario, RegressionSuite, UnconfiguredGenerator,
    };
    pub use crate::executor::Executor;
    pub use crate::facts::{Fact, FactSet};
    pub use crate::kernel::{
        FailureReason, Kernel, KernelConfig, RunReport, RunStatus, Session,
    };
    pub use crate::planner::{Action, Plan, PlanError, Planner, SubprocessPlanner};
    pub use crate::sandbox::{SandboxError, SandboxManager, SandboxWorkspace};
    pub use crate::skills::{
        ArgKind, EffectContract, ExecutionError, ExecutionResult, Skill, SkillHandle,
        SkillRegistry,
    };
    pub use crate::translator::{
        GroundedTranslator, Translation, TranslationError, Translator,
    };
}
