//! Ground facts and the fact-set describing world-state.
//!
//! A [`Fact`] is a single ground predicate such as `(at report_dot_txt root)`.
//! A [`FactSet`] is the unique set of facts the kernel holds at an instant.
//! The set mutates only through [`FactSet::apply`], which removes deleted
//! facts before inserting added ones, so a predicate and its unresolved
//! deletion are never asserted simultaneously.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single ground predicate: a name plus ordered argument identifiers.
///
/// Canonical text form is `(name arg1 arg2 ...)`, the form planners and
/// skills exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fact {
    name: String,
    args: Vec<String>,
}

/// Error returned when parsing an invalid fact literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFact {
    /// The literal that failed to parse
    pub literal: String,
    /// Why it was rejected
    pub reason: String,
}

impl fmt::Display for InvalidFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid fact literal '{}': {}; expected '(name arg1 arg2 ...)'",
            self.literal, self.reason
        )
    }
}

impl std::error::Error for InvalidFact {}

impl Fact {
    /// Creates a fact from a predicate name and argument identifiers.
    ///
    /// Name and arguments are normalized to lowercase.
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

    /// Parses a fact from its canonical text form.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFact`] if the literal is not a single flat
    /// parenthesized term with a predicate name.
    pub fn parse(literal: &str) -> Result<Self, InvalidFact> {
        let trimmed = literal.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| InvalidFact {
                literal: literal.to_string(),
                reason: "missing surrounding parentheses".to_string(),
            })?;

        if inner.contains('(') || inner.contains(')') {
            return Err(InvalidFact {
                literal: literal.to_string(),
                reason: "nested terms are not ground facts".to_string(),
            });
        }

        let mut parts = inner.split_whitespace();
        let name = parts.next().ok_or_else(|| InvalidFact {
            literal: literal.to_string(),
            reason: "empty term".to_string(),
        })?;

        Ok(Self::new(name, parts.map(str::to_string)))
    }

    /// Returns the predicate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordered argument identifiers.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the arity of the predicate instance.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

impl FromStr for Fact {
    type Err = InvalidFact;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Escapes a filename into a planner-safe symbol.
///
/// Dots are not legal in planner symbols, so `report.txt` becomes
/// `report_dot_txt`.
#[must_use]
pub fn to_symbol(filename: &str) -> String {
    filename.to_lowercase().replace('.', "_dot_")
}

/// Reverses [`to_symbol`], turning `report_dot_txt` back into `report.txt`.
#[must_use]
pub fn from_symbol(symbol: &str) -> String {
    symbol.replace("_dot_", ".")
}

/// The set of facts describing world-state at an instant.
///
/// Backed by an ordered set so iteration and rendering are deterministic.
/// Created once at kernel start from initial observations, mutated only by
/// successful executor calls, and never rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSet {
    facts: BTreeSet<Fact>,
}

impl FactSet {
    /// Creates an empty fact-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of facts held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if no facts are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns true if the exact fact is present.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.facts.contains(fact)
    }

    /// Inserts a single fact. Returns true if it was newly inserted.
    pub fn insert(&mut self, fact: Fact) -> bool {
        self.facts.insert(fact)
    }

    /// Removes a single fact. Returns true if it was present.
    pub fn remove(&mut self, fact: &Fact) -> bool {
        self.facts.remove(fact)
    }

    /// Applies an execution delta: all deletions first, then all additions.
    ///
    /// The ordering means an action may net no-op on a predicate by deleting
    /// and re-adding it, and the set can never end up asserting a predicate
    /// alongside its own unresolved deletion.
    pub fn apply(&mut self, del_facts: &[Fact], add_facts: &[Fact]) {
        for fact in del_facts {
            self.facts.remove(fact);
        }
        for fact in add_facts {
            self.facts.insert(fact.clone());
        }
    }

    /// Returns true if every `required` fact is present and every
    /// `forbidden` fact is absent.
    #[must_use]
    pub fn satisfies(&self, required: &[Fact], forbidden: &[Fact]) -> bool {
        required.iter().all(|f| self.facts.contains(f))
            && forbidden.iter().all(|f| !self.facts.contains(f))
    }

    /// Iterates the facts in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Returns true if any fact mentions `symbol` as an argument.
    #[must_use]
    pub fn knows_object(&self, symbol: &str) -> bool {
        self.facts
            .iter()
            .any(|f| f.args().iter().any(|a| a == symbol))
    }
}

impl FromIterator<Fact> for FactSet {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        Self {
            facts: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for FactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for fact in &self.facts {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{fact}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(literal: &str) -> Fact {
        Fact::parse(literal).unwrap()
    }

    #[test]
    fn parse_round_trips_canonical_form() {
        let parsed = fact("(at report_dot_txt root)");
        assert_eq!(parsed.name(), "at");
        assert_eq!(parsed.args(), ["report_dot_txt", "root"]);
        assert_eq!(parsed.to_string(), "(at report_dot_txt root)");
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let parsed = fact("  (At   File1  ROOT)  ");
        assert_eq!(parsed.to_string(), "(at file1 root)");
    }

    #[test]
    fn parse_rejects_missing_parentheses() {
        let result = Fact::parse("at file1 root");
        assert!(matches!(result, Err(InvalidFact { .. })));
    }

    #[test]
    fn parse_rejects_nested_terms() {
        let result = Fact::parse("(not (at file1 root))");
        let err = result.unwrap_err();
        assert!(err.reason.contains("nested"));
    }

    #[test]
    fn parse_rejects_empty_term() {
        assert!(Fact::parse("()").is_err());
    }

    #[test]
    fn zero_arity_fact_is_valid() {
        let parsed = fact("(has_admin_rights)");
        assert_eq!(parsed.arity(), 0);
        assert_eq!(parsed.to_string(), "(has_admin_rights)");
    }

    #[test]
    fn symbol_escaping_round_trips() {
        assert_eq!(to_symbol("report.txt"), "report_dot_txt");
        assert_eq!(from_symbol("report_dot_txt"), "report.txt");
        assert_eq!(from_symbol(&to_symbol("a.b.c")), "a.b.c");
    }

    #[test]
    fn apply_removes_before_inserting() {
        let mut facts = FactSet::new();
        facts.insert(fact("(at file1 root)"));

        facts.apply(&[fact("(at file1 root)")], &[fact("(at file1 backup)")]);

        assert!(!facts.contains(&fact("(at file1 root)")));
        assert!(facts.contains(&fact("(at file1 backup)")));
    }

    #[test]
    fn apply_delete_then_re_add_is_net_noop() {
        let mut facts = FactSet::new();
        facts.insert(fact("(scanned root)"));

        facts.apply(&[fact("(scanned root)")], &[fact("(scanned root)")]);

        assert!(facts.contains(&fact("(scanned root)")));
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn satisfies_checks_required_and_forbidden() {
        let mut facts = FactSet::new();
        facts.insert(fact("(at file1 backup)"));

        assert!(facts.satisfies(&[fact("(at file1 backup)")], &[fact("(at file1 root)")]));
        assert!(!facts.satisfies(&[fact("(at file1 root)")], &[]));
        assert!(!facts.satisfies(&[], &[fact("(at file1 backup)")]));
    }

    #[test]
    fn duplicate_insert_keeps_set_unique() {
        let mut facts = FactSet::new();
        assert!(facts.insert(fact("(at file1 root)")));
        assert!(!facts.insert(fact("(at file1 root)")));
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn knows_object_matches_arguments_only() {
        let mut facts = FactSet::new();
        facts.insert(fact("(at file1 root)"));

        assert!(facts.knows_object("file1"));
        assert!(facts.knows_object("root"));
        assert!(!facts.knows_object("at"));
        assert!(!facts.knows_object("backup"));
    }

    #[test]
    fn display_renders_in_deterministic_order() {
        let facts: FactSet = [fact("(scanned root)"), fact("(at file1 root)")]
            .into_iter()
            .collect();
        assert_eq!(facts.to_string(), "(at file1 root) (scanned root)");
    }
}
