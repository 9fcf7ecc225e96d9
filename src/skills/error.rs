//! Execution error types.

use std::fmt;

/// Errors that can occur when the executor dispatches an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// The specific error that occurred
    pub kind: ExecutionErrorKind,
}

/// Specific execution error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// The action names a skill that is not registered
    UnknownSkill {
        /// The requested skill name
        name: String,
        /// The closest registered name, if any is plausible
        suggestion: Option<String>,
    },
    /// Argument count does not match the skill's declared arity
    ArgumentMismatch {
        /// The skill name
        skill: String,
        /// Declared arity
        expected: usize,
        /// Arguments supplied
        actual: usize,
    },
    /// The skill ran and reported failure
    SkillRuntime {
        /// The skill name
        skill: String,
        /// The failure message the skill reported
        reason: String,
    },
}

impl ExecutionError {
    /// Creates a new ExecutionError with the given kind.
    #[must_use]
    pub fn new(kind: ExecutionErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an unknown skill error.
    #[must_use]
    pub fn unknown_skill(name: impl Into<String>, suggestion: Option<String>) -> Self {
        Self::new(ExecutionErrorKind::UnknownSkill {
            name: name.into(),
            suggestion,
        })
    }

    /// Creates an argument mismatch error.
    #[must_use]
    pub fn argument_mismatch(skill: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::new(ExecutionErrorKind::ArgumentMismatch {
            skill: skill.into(),
            expected,
            actual,
        })
    }

    /// Creates a skill runtime error.
    #[must_use]
    pub fn skill_runtime(skill: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::SkillRuntime {
            skill: skill.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error indicates the skill was not registered.
    #[must_use]
    pub fn is_unknown_skill(&self) -> bool {
        matches!(self.kind, ExecutionErrorKind::UnknownSkill { .. })
    }

    /// Returns true if this error came from inside a running skill.
    #[must_use]
    pub fn is_skill_runtime(&self) -> bool {
        matches!(self.kind, ExecutionErrorKind::SkillRuntime { .. })
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExecutionErrorKind::UnknownSkill { name, suggestion } => {
                write!(f, "unknown skill '{name}'")?;
                if let Some(s) = suggestion {
                    write!(f, "; did you mean '{s}'?")?;
                }
                write!(f, " verify the skill is registered")
            }
            ExecutionErrorKind::ArgumentMismatch {
                skill,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "skill '{skill}' expects {expected} argument(s), got {actual}; \
                     check the planner's action arity against the skill contract"
                )
            }
            ExecutionErrorKind::SkillRuntime { skill, reason } => {
                write!(f, "skill '{skill}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}
