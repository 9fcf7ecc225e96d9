//! Goal translation: natural-language goal + facts → planning problem.
//!
//! Translation quality is a collaborator concern behind the [`Translator`]
//! trait. [`GroundedTranslator`] is the deterministic implementation for the
//! file-management vocabulary: it recognizes a fixed verb grammar, grounds
//! every mentioned object against the fact-set, and emits a full problem
//! block. An ungroundable object is a hard error, never a guess.

use crate::facts::{to_symbol, Fact, FactSet};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// A grounded planning problem plus the goal conditions the kernel checks
/// directly against the fact-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Full problem text handed to the planner
    pub text: String,
    /// Facts that must hold for the goal to be satisfied
    pub goal_facts: Vec<Fact>,
    /// Facts that must be absent for the goal to be satisfied
    pub goal_absent: Vec<Fact>,
}

impl Problem {
    /// Returns true if the goal conditions hold in `facts`.
    #[must_use]
    pub fn satisfied_by(&self, facts: &FactSet) -> bool {
        facts.satisfies(&self.goal_facts, &self.goal_absent)
    }
}

/// Translation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// A grounded problem ready for the planner
    Ready(Problem),
    /// The goal already holds; no planning is needed
    AlreadySatisfied,
}

/// Errors that can occur when grounding a goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationError {
    /// The specific error that occurred
    pub kind: TranslationErrorKind,
}

/// Specific translation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationErrorKind {
    /// The goal mentions an object no fact knows about
    UnknownObject {
        /// The ungroundable object symbol
        object: String,
    },
    /// The goal does not match the supported grammar
    UnrecognizedGoal {
        /// The goal as given
        goal: String,
    },
}

impl TranslationError {
    /// Creates an unknown object error.
    #[must_use]
    pub fn unknown_object(object: impl Into<String>) -> Self {
        Self {
            kind: TranslationErrorKind::UnknownObject {
                object: object.into(),
            },
        }
    }

    /// Creates an unrecognized goal error.
    #[must_use]
    pub fn unrecognized_goal(goal: impl Into<String>) -> Self {
        Self {
            kind: TranslationErrorKind::UnrecognizedGoal { goal: goal.into() },
        }
    }

    /// Returns true if the goal mentioned an unknown object.
    #[must_use]
    pub fn is_unknown_object(&self) -> bool {
        matches!(self.kind, TranslationErrorKind::UnknownObject { .. })
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TranslationErrorKind::UnknownObject { object } => write!(
                f,
                "goal mentions '{object}', which no known fact grounds; \
                 scan its location first"
            ),
            TranslationErrorKind::UnrecognizedGoal { goal } => write!(
                f,
                "goal '{goal}' does not match the supported grammar \
                 (move/copy/remove/create/rename/scan)"
            ),
        }
    }
}

impl std::error::Error for TranslationError {}

/// Turns a goal and the current facts into a planning problem.
pub trait Translator {
    /// Translates `goal` under `facts`.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError`] if the goal cannot be grounded.
    fn translate(&self, goal: &str, facts: &FactSet) -> Result<Translation, TranslationError>;
}

/// Deterministic grounding over the file-management vocabulary.
#[derive(Debug, Clone)]
pub struct GroundedTranslator {
    domain_name: String,
}

impl GroundedTranslator {
    /// Creates a translator emitting problems for the given domain name.
    #[must_use]
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
        }
    }

    fn ground_known(&self, facts: &FactSet, object: &str) -> Result<(), TranslationError> {
        if facts.knows_object(object) {
            Ok(())
        } else {
            Err(TranslationError::unknown_object(object))
        }
    }

    fn render_problem(
        &self,
        facts: &FactSet,
        goal_facts: Vec<Fact>,
        goal_absent: Vec<Fact>,
        extra_objects: &[&str],
    ) -> Problem {
        let mut objects: BTreeSet<String> = facts
            .iter()
            .flat_map(|f| f.args().iter().cloned())
            .collect();
        for object in extra_objects {
            objects.insert((*object).to_string());
        }

        let mut text = String::new();
        text.push_str(&format!(
            "(define (problem grounded-goal)\n  (:domain {})\n",
            self.domain_name
        ));
        text.push_str("  (:objects");
        for object in &objects {
            text.push_str(&format!(" {object}"));
        }
        text.push_str(")\n  (:init");
        for fact in facts.iter() {
            text.push_str(&format!(" {fact}"));
        }
        text.push_str(")\n  (:goal (and");
        for fact in &goal_facts {
            text.push_str(&format!(" {fact}"));
        }
        for fact in &goal_absent {
            text.push_str(&format!(" (not {fact})"));
        }
        text.push_str(")))\n");

        Problem {
            text,
            goal_facts,
            goal_absent,
        }
    }
}

impl Translator for GroundedTranslator {
    fn translate(&self, goal: &str, facts: &FactSet) -> Result<Translation, TranslationError> {
        let goal = goal.trim().to_lowercase();

        // One pattern per supported verb phrase. Object words are bare
        // tokens; filenames keep their dots here and are escaped during
        // grounding.
        let move_re = Regex::new(r"^move\s+(\S+)\s+from\s+(\S+)\s+to\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));
        let copy_re = Regex::new(r"^copy\s+(\S+)\s+from\s+(\S+)\s+to\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));
        let remove_re = Regex::new(r"^(?:remove|delete)\s+(\S+)\s+from\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));
        let create_re = Regex::new(r"^create\s+(?:file\s+)?(\S+)\s+in\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));
        let rename_re = Regex::new(r"^rename\s+(\S+)\s+to\s+(\S+)\s+in\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));
        let scan_re = Regex::new(r"^scan\s+(\S+)$")
            .unwrap_or_else(|_| unreachable!("pattern is valid"));

        let (goal_facts, goal_absent, new_objects): (Vec<Fact>, Vec<Fact>, Vec<String>) =
            if let Some(caps) = move_re.captures(&goal) {
                let (file, from, to) = (to_symbol(&caps[1]), to_symbol(&caps[2]), to_symbol(&caps[3]));
                self.ground_known(facts, &file)?;
                self.ground_known(facts, &from)?;
                self.ground_known(facts, &to)?;
                (
                    vec![Fact::new("at", [file.clone(), to])],
                    vec![Fact::new("at", [file, from])],
                    vec![],
                )
            } else if let Some(caps) = copy_re.captures(&goal) {
                let (file, _from, to) = (to_symbol(&caps[1]), to_symbol(&caps[2]), to_symbol(&caps[3]));
                self.ground_known(facts, &file)?;
                self.ground_known(facts, &to)?;
                (vec![Fact::new("at", [file, to])], vec![], vec![])
            } else if let Some(caps) = remove_re.captures(&goal) {
                let (file, from) = (to_symbol(&caps[1]), to_symbol(&caps[2]));
                self.ground_known(facts, &from)?;
                (vec![], vec![Fact::new("at", [file, from])], vec![])
            } else if let Some(caps) = create_re.captures(&goal) {
                let (file, dir) = (to_symbol(&caps[1]), to_symbol(&caps[2]));
                self.ground_known(facts, &dir)?;
                // The created file is a genuinely new object.
                (
                    vec![Fact::new("at", [file.clone(), dir])],
                    vec![],
                    vec![file],
                )
            } else if let Some(caps) = rename_re.captures(&goal) {
                let (old, new, dir) = (to_symbol(&caps[1]), to_symbol(&caps[2]), to_symbol(&caps[3]));
                self.ground_known(facts, &old)?;
                self.ground_known(facts, &dir)?;
                (
                    vec![Fact::new("at", [new.clone(), dir.clone()])],
                    vec![Fact::new("at", [old, dir])],
                    vec![new],
                )
            } else if let Some(caps) = scan_re.captures(&goal) {
                let dir = to_symbol(&caps[1]);
                (
                    vec![Fact::new("scanned", [dir.clone()])],
                    vec![],
                    vec![dir],
                )
            } else {
                return Err(TranslationError::unrecognized_goal(goal));
            };

        if facts.satisfies(&goal_facts, &goal_absent) {
            tracing::info!(goal = %goal, "Goal already satisfied, skipping planning");
            return Ok(Translation::AlreadySatisfied);
        }

        let extra: Vec<&str> = new_objects.iter().map(String::as_str).collect();
        Ok(Translation::Ready(self.render_problem(
            facts,
            goal_facts,
            goal_absent,
            &extra,
        )))
    }
}
