//! Planner contract: domain + problem in, ordered action sequence out.
//!
//! The search algorithm itself is a black box behind the [`Planner`] trait;
//! this module defines the action/plan types, the typed failure taxonomy,
//! and the subprocess adapter that drives an external planner binary.

pub mod subprocess;

pub use subprocess::SubprocessPlanner;

use std::fmt;

/// One planned step: a skill name plus ground symbol arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    args: Vec<String>,
}

impl Action {
    /// Creates an action. The name is case-normalized.
    #[must_use]
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            args: args
                .into_iter()
                .map(|a| a.into().to_lowercase())
                .collect(),
        }
    }

    /// Returns the skill name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordered ground arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// An ordered action sequence, immutable once received from the planner.
///
/// An empty plan means the goal already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    /// Creates a plan from an ordered action list.
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Returns the actions in execution order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, action) in self.actions.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// Errors a planner invocation can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanError {
    /// The specific failure that occurred
    pub kind: PlanErrorKind,
}

/// Specific planner failure classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanErrorKind {
    /// The problem has no solution under the current domain
    Unsolvable {
        /// The single missing capability the failure is attributable to,
        /// when the planner names one
        missing_action: Option<String>,
        /// Planner diagnostic text
        detail: String,
    },
    /// The domain or problem text was rejected as malformed
    Syntax {
        /// Planner diagnostic text
        detail: String,
    },
    /// The invocation exceeded its wall-clock budget
    Timeout {
        /// The configured budget in seconds
        limit_secs: u64,
    },
    /// The planner process could not be driven at all
    Invocation {
        /// What went wrong launching or reading the process
        reason: String,
    },
}

impl PlanError {
    /// Creates a new PlanError with the given kind.
    #[must_use]
    pub fn new(kind: PlanErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an unsolvable error, optionally naming the missing capability.
    #[must_use]
    pub fn unsolvable(missing_action: Option<String>, detail: impl Into<String>) -> Self {
        Self::new(PlanErrorKind::Unsolvable {
            missing_action,
            detail: detail.into(),
        })
    }

    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(detail: impl Into<String>) -> Self {
        Self::new(PlanErrorKind::Syntax {
            detail: detail.into(),
        })
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(limit_secs: u64) -> Self {
        Self::new(PlanErrorKind::Timeout { limit_secs })
    }

    /// Creates an invocation error.
    #[must_use]
    pub fn invocation(reason: impl Into<String>) -> Self {
        Self::new(PlanErrorKind::Invocation {
            reason: reason.into(),
        })
    }

    /// Returns the missing capability name, if this failure names one.
    #[must_use]
    pub fn missing_action(&self) -> Option<&str> {
        match &self.kind {
            PlanErrorKind::Unsolvable { missing_action, .. } => missing_action.as_deref(),
            _ => None,
        }
    }

    /// Returns true if the problem was unsolvable.
    #[must_use]
    pub fn is_unsolvable(&self) -> bool {
        matches!(self.kind, PlanErrorKind::Unsolvable { .. })
    }

    /// Returns true if the invocation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, PlanErrorKind::Timeout { .. })
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PlanErrorKind::Unsolvable {
                missing_action: Some(action),
                detail,
            } => write!(
                f,
                "no plan exists: capability '{action}' is missing from the domain ({detail})"
            ),
            PlanErrorKind::Unsolvable {
                missing_action: None,
                detail,
            } => write!(f, "no plan exists for this problem: {detail}"),
            PlanErrorKind::Syntax { detail } => {
                write!(f, "planner rejected the domain or problem text: {detail}")
            }
            PlanErrorKind::Timeout { limit_secs } => write!(
                f,
                "planner exceeded its {limit_secs}s budget; \
                 raise planner.timeout_secs or simplify the goal"
            ),
            PlanErrorKind::Invocation { reason } => {
                write!(
                    f,
                    "planner process failed: {reason}; check planner.command points \
                     at an executable planner binary"
                )
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// A symbolic planner.
pub trait Planner {
    /// Produces an ordered plan for `problem` under `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] classifying the failure.
    fn plan(&self, domain: &str, problem: &str) -> Result<Plan, PlanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_normalizes_case() {
        let action = Action::new("Move", ["File1", "ROOT", "backup"]);
        assert_eq!(action.name(), "move");
        assert_eq!(action.args(), ["file1", "root", "backup"]);
    }

    #[test]
    fn action_displays_in_plan_line_form() {
        let action = Action::new("move", ["file1", "root", "backup"]);
        assert_eq!(action.to_string(), "(move file1 root backup)");
    }

    #[test]
    fn plan_display_is_one_action_per_line() {
        let plan = Plan::new(vec![
            Action::new("scan", ["root"]),
            Action::new("move", ["file1", "root", "backup"]),
        ]);
        assert_eq!(plan.to_string(), "(scan root)\n(move file1 root backup)");
    }

    #[test]
    fn empty_plan_reports_empty() {
        assert!(Plan::default().is_empty());
    }

    #[test]
    fn missing_action_is_only_reported_for_unsolvable() {
        let gap = PlanError::unsolvable(Some("rename".to_string()), "undeclared action");
        assert_eq!(gap.missing_action(), Some("rename"));

        assert_eq!(PlanError::timeout(10).missing_action(), None);
        assert_eq!(PlanError::syntax("bad token").missing_action(), None);
    }

    #[test]
    fn display_messages_are_actionable() {
        let error = PlanError::unsolvable(Some("rename".to_string()), "x");
        assert!(error.to_string().contains("rename"));

        let error = PlanError::timeout(30);
        assert!(error.to_string().contains("30s"));
    }
}
