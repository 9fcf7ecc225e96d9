//! Skill contract, registry, and built-in filesystem skills.
//!
//! A skill is one executable capability: it declares its name, parameter
//! arity, and an effect contract (the predicates it may add or delete), and
//! executes against a storage root, reporting the fact delta it caused.
//! Skills enter the production registry either at startup (built-ins) or
//! through promotion after an audited evolution trial, never speculatively.

pub mod builtins;
pub mod error;
pub mod path;
pub mod registry;

pub use error::{ExecutionError, ExecutionErrorKind};
pub use registry::SkillRegistry;

use crate::facts::Fact;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The declared kind of one skill parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// A file symbol (dots escaped as `_dot_`)
    File,
    /// A folder symbol
    Folder,
    /// Any other planner symbol
    Symbol,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
            Self::Symbol => write!(f, "symbol"),
        }
    }
}

/// The predicates a skill declares it may add or delete.
///
/// The auditor's static-alignment layer checks this contract bidirectionally
/// against the candidate's declarative action text, so a skill cannot
/// misreport its own effects without being caught before execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EffectContract {
    /// Predicate names the skill may assert
    pub adds: Vec<String>,
    /// Predicate names the skill may retract
    pub dels: Vec<String>,
}

impl EffectContract {
    /// Creates a contract from added and deleted predicate names.
    #[must_use]
    pub fn new(
        adds: impl IntoIterator<Item = impl Into<String>>,
        dels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            adds: adds.into_iter().map(Into::into).collect(),
            dels: dels.into_iter().map(Into::into).collect(),
        }
    }
}

/// The outcome one skill execution reports.
///
/// The fact-set mutates only when `success` is true; the executor converts a
/// failed result into a typed error without touching the facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the skill achieved its physical effect
    pub success: bool,
    /// Human-readable outcome description
    pub message: String,
    /// Facts to insert after deletions
    pub add_facts: Vec<Fact>,
    /// Facts to remove first
    pub del_facts: Vec<Fact>,
}

impl ExecutionResult {
    /// Creates a successful result with a fact delta.
    #[must_use]
    pub fn success(
        message: impl Into<String>,
        add_facts: Vec<Fact>,
        del_facts: Vec<Fact>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            add_facts,
            del_facts,
        }
    }

    /// Creates a failed result. Carries no fact delta.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            add_facts: Vec::new(),
            del_facts: Vec::new(),
        }
    }
}

/// One executable capability.
///
/// Implementations must resolve every path strictly under the storage root
/// they are handed (see [`path::resolve_under`]); the same skill instance is
/// shared between production and sandbox executions, differing only in the
/// root it receives.
pub trait Skill: Send + Sync {
    /// The registry name of the skill, lowercase.
    fn name(&self) -> &str;

    /// Declared parameter kinds, in call order. Length is the arity the
    /// executor enforces before dispatch.
    fn params(&self) -> &[ArgKind];

    /// The declared effect contract.
    fn effects(&self) -> &EffectContract;

    /// Executes the skill against `root` with ground symbol arguments.
    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult;
}

/// Shared handle to a skill.
pub type SkillHandle = Arc<dyn Skill>;
