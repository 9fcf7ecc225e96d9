//! Three-layer candidate verification: syntax, static alignment, physical
//! alignment.
//!
//! The layers run in order, cheapest first, and the first failure decides
//! the verdict. Syntax parses the declarative action text against the
//! supported grammar and the domain's predicate table. Static alignment
//! compares the text's declared effects against the skill's effect contract
//! in both directions. Physical alignment runs the skill once inside the
//! sandbox jail and requires the observed filesystem diff to match the
//! reported fact delta exactly, which is what catches a false evolution
//! before it can reach production.

use crate::evolution::Candidate;
use crate::facts::{from_symbol, Fact};
use crate::sandbox::SandboxWorkspace;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

/// The verification layer a rejection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLayer {
    /// Declarative action text parsing and predicate-table checks
    Syntax,
    /// Action text effects vs skill effect contract
    StaticAlignment,
    /// Declared fact delta vs observed filesystem diff
    PhysicalAlignment,
}

impl fmt::Display for AuditLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::StaticAlignment => write!(f, "static alignment"),
            Self::PhysicalAlignment => write!(f, "physical alignment"),
        }
    }
}

/// The auditor's combined verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditVerdict {
    /// All three layers passed
    Accepted,
    /// A layer rejected the candidate
    Rejected {
        /// The first failing layer
        layer: AuditLayer,
        /// Why it failed
        reason: String,
    },
}

impl AuditVerdict {
    /// Returns true if the candidate was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    fn rejected(layer: AuditLayer, reason: impl Into<String>) -> Self {
        Self::Rejected {
            layer,
            reason: reason.into(),
        }
    }
}

/// A parsed s-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c.to_ascii_lowercase()),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_sexp(tokens: &[String], pos: &mut usize) -> Result<Sexp, String> {
    let token = tokens
        .get(*pos)
        .ok_or_else(|| "unexpected end of input".to_string())?;
    *pos += 1;

    if token == "(" {
        let mut items = Vec::new();
        loop {
            match tokens.get(*pos) {
                Some(t) if t == ")" => {
                    *pos += 1;
                    return Ok(Sexp::List(items));
                }
                Some(_) => items.push(parse_sexp(tokens, pos)?),
                None => return Err("unbalanced parentheses".to_string()),
            }
        }
    } else if token == ")" {
        Err("unexpected closing paren".to_string())
    } else {
        Ok(Sexp::Atom(token.clone()))
    }
}

fn parse_single(text: &str) -> Result<Sexp, String> {
    let tokens = tokenize(text);
    let mut pos = 0;
    let sexp = parse_sexp(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err("trailing tokens after action block".to_string());
    }
    Ok(sexp)
}

/// The declarative content of one parsed `(:action ...)` block.
#[derive(Debug, Clone)]
struct ParsedAction {
    name: String,
    adds: BTreeSet<String>,
    dels: BTreeSet<String>,
}

/// Verifies candidates against a domain's predicate vocabulary.
#[derive(Debug, Clone)]
pub struct Auditor {
    /// Predicate name → arity, from the domain's `(:predicates ...)` block
    predicates: BTreeMap<String, usize>,
}

impl Auditor {
    /// Builds an auditor from domain text, extracting the predicate table.
    ///
    /// A domain without a parsable predicates block yields an empty table,
    /// under which every candidate fails the syntax layer.
    #[must_use]
    pub fn from_domain(domain_text: &str) -> Self {
        let mut predicates = BTreeMap::new();
        if let Ok(Sexp::List(items)) = parse_single(domain_text) {
            for item in items {
                let Sexp::List(entries) = item else { continue };
                if entries.first() != Some(&Sexp::Atom(":predicates".to_string())) {
                    continue;
                }
                for entry in &entries[1..] {
                    let Sexp::List(decl) = entry else { continue };
                    let Some(Sexp::Atom(name)) = decl.first() else {
                        continue;
                    };
                    // Parameters are `?x - type` triples; count variables.
                    let arity = decl[1..]
                        .iter()
                        .filter(|s| matches!(s, Sexp::Atom(a) if a.starts_with('?')))
                        .count();
                    predicates.insert(name.clone(), arity);
                }
            }
        }
        Self { predicates }
    }

    /// Runs all three layers against a candidate inside a sandbox.
    ///
    /// The physical layer executes the candidate's skill against the
    /// sandbox's storage jail, so the jail is dirty afterwards and must be
    /// reset before any further trial use.
    #[must_use]
    pub fn audit(&self, candidate: &Candidate, workspace: &SandboxWorkspace) -> AuditVerdict {
        let parsed = match self.check_syntax(&candidate.action_text) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::warn!(layer = "syntax", %reason, "Candidate rejected");
                return AuditVerdict::rejected(AuditLayer::Syntax, reason);
            }
        };

        if let Err(reason) = self.check_static(&parsed, candidate) {
            tracing::warn!(layer = "static", %reason, "Candidate rejected");
            return AuditVerdict::rejected(AuditLayer::StaticAlignment, reason);
        }

        if let Err(reason) = self.check_physical(candidate, workspace) {
            tracing::warn!(layer = "physical", %reason, "Candidate rejected");
            return AuditVerdict::rejected(AuditLayer::PhysicalAlignment, reason);
        }

        tracing::info!(action = %parsed.name, "Candidate accepted by all audit layers");
        AuditVerdict::Accepted
    }

    fn check_syntax(&self, action_text: &str) -> Result<ParsedAction, String> {
        let Sexp::List(items) = parse_single(action_text)? else {
            return Err("action block must be a parenthesized form".to_string());
        };

        // Fixed section order: :action NAME :parameters (...)
        // :precondition (...) :effect (...).
        if items.len() != 8 {
            return Err(
                "expected (:action name :parameters (...) :precondition (...) :effect (...))"
                    .to_string(),
            );
        }
        expect_keyword(&items[0], ":action")?;
        let Sexp::Atom(name) = &items[1] else {
            return Err("action name must be an atom".to_string());
        };
        expect_keyword(&items[2], ":parameters")?;
        let params = parse_params(&items[3])?;
        expect_keyword(&items[4], ":precondition")?;
        self.check_formula(&items[5], &params, false, &mut BTreeSet::new(), &mut BTreeSet::new())?;
        expect_keyword(&items[6], ":effect")?;

        let mut adds = BTreeSet::new();
        let mut dels = BTreeSet::new();
        self.check_formula(&items[7], &params, false, &mut adds, &mut dels)?;

        Ok(ParsedAction {
            name: name.clone(),
            adds,
            dels,
        })
    }

    /// Validates a precondition/effect formula and collects effect polarity.
    fn check_formula(
        &self,
        formula: &Sexp,
        params: &BTreeSet<String>,
        negated: bool,
        adds: &mut BTreeSet<String>,
        dels: &mut BTreeSet<String>,
    ) -> Result<(), String> {
        let Sexp::List(items) = formula else {
            return Err("formula must be a parenthesized form".to_string());
        };
        let Some(Sexp::Atom(head)) = items.first() else {
            if items.is_empty() {
                return Ok(());
            }
            return Err("formula head must be an atom".to_string());
        };

        match head.as_str() {
            "and" => {
                for item in &items[1..] {
                    self.check_formula(item, params, negated, adds, dels)?;
                }
                Ok(())
            }
            "not" => {
                if negated {
                    return Err("nested negation is not supported".to_string());
                }
                if items.len() != 2 {
                    return Err("'not' takes exactly one literal".to_string());
                }
                self.check_formula(&items[1], params, true, adds, dels)
            }
            predicate => {
                let arity = self
                    .predicates
                    .get(predicate)
                    .ok_or_else(|| format!("unknown predicate '{predicate}'"))?;
                let args = &items[1..];
                if args.len() != *arity {
                    return Err(format!(
                        "predicate '{predicate}' takes {arity} argument(s), found {}",
                        args.len()
                    ));
                }
                for arg in args {
                    let Sexp::Atom(symbol) = arg else {
                        return Err(format!("arguments of '{predicate}' must be atoms"));
                    };
                    if symbol.starts_with('?') && !params.contains(symbol) {
                        return Err(format!("unbound parameter '{symbol}' in '{predicate}'"));
                    }
                }
                if negated {
                    dels.insert(predicate.to_string());
                } else {
                    adds.insert(predicate.to_string());
                }
                Ok(())
            }
        }
    }

    fn check_static(&self, parsed: &ParsedAction, candidate: &Candidate) -> Result<(), String> {
        let contract = candidate.skill.effects();
        let declared_adds: BTreeSet<String> = contract.adds.iter().cloned().collect();
        let declared_dels: BTreeSet<String> = contract.dels.iter().cloned().collect();

        if parsed.adds != declared_adds {
            return Err(format!(
                "added predicates diverge: action text declares {:?}, skill contract declares {:?}",
                parsed.adds, declared_adds
            ));
        }
        if parsed.dels != declared_dels {
            return Err(format!(
                "deleted predicates diverge: action text declares {:?}, skill contract declares {:?}",
                parsed.dels, declared_dels
            ));
        }
        if candidate.test_args.len() != candidate.skill.params().len() {
            return Err(format!(
                "representative argument count {} does not match skill arity {}",
                candidate.test_args.len(),
                candidate.skill.params().len()
            ));
        }
        if parsed.name != candidate.skill.name().to_lowercase() {
            return Err(format!(
                "action name '{}' does not match skill name '{}'",
                parsed.name,
                candidate.skill.name()
            ));
        }
        Ok(())
    }

    fn check_physical(
        &self,
        candidate: &Candidate,
        workspace: &SandboxWorkspace,
    ) -> Result<(), String> {
        let jail = workspace.storage_root();
        let before = snapshot(jail);

        let result = candidate.skill.execute(&candidate.test_args, jail);
        if !result.success {
            return Err(format!(
                "skill reported failure on representative arguments: {}",
                result.message
            ));
        }

        let after = snapshot(jail);
        let created: BTreeSet<String> = after.difference(&before).cloned().collect();
        let removed: BTreeSet<String> = before.difference(&after).cloned().collect();

        let declared_created = footprints(&result.add_facts);
        let declared_removed = footprints(&result.del_facts);

        if created != declared_created {
            return Err(format!(
                "created entries diverge: observed {created:?}, declared {declared_created:?}"
            ));
        }
        if removed != declared_removed {
            return Err(format!(
                "removed entries diverge: observed {removed:?}, declared {declared_removed:?}"
            ));
        }
        Ok(())
    }
}

fn expect_keyword(sexp: &Sexp, keyword: &str) -> Result<(), String> {
    match sexp {
        Sexp::Atom(atom) if atom == keyword => Ok(()),
        _ => Err(format!("expected '{keyword}' section")),
    }
}

fn parse_params(sexp: &Sexp) -> Result<BTreeSet<String>, String> {
    let Sexp::List(items) = sexp else {
        return Err("parameter list must be parenthesized".to_string());
    };
    let mut params = BTreeSet::new();
    for chunk in items.chunks(3) {
        let [Sexp::Atom(var), Sexp::Atom(dash), Sexp::Atom(_)] = chunk else {
            return Err("parameters must be '?name - type' triples".to_string());
        };
        if !var.starts_with('?') || dash.as_str() != "-" {
            return Err("parameters must be '?name - type' triples".to_string());
        }
        params.insert(var.clone());
    }
    Ok(params)
}

/// Recursive filesystem snapshot as relative path strings.
fn snapshot(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().to_string())
        })
        .collect()
}

/// Maps facts to the filesystem entries they stand for.
///
/// `(at f d)` stands for the file `d/f`; `(connected a b)` with one side at
/// the storage root stands for the top-level directory on the other side.
/// Pure-state predicates such as `scanned` have no footprint.
fn footprints(facts: &[Fact]) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    for fact in facts {
        match (fact.name(), fact.args()) {
            ("at", [file, dir]) => {
                paths.insert(format!("{}/{}", from_symbol(dir), from_symbol(file)));
            }
            ("connected", [a, b]) => {
                if a == "root" && b != "root" {
                    paths.insert(from_symbol(b));
                } else if b == "root" && a != "root" {
                    paths.insert(from_symbol(a));
                }
            }
            _ => {}
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_DOMAIN;
    use crate::evolution::Candidate;
    use crate::sandbox::SandboxManager;
    use crate::skills::{ArgKind, EffectContract, ExecutionResult, Skill};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    const RENAME_TEXT: &str = "(:action rename\n  \
        :parameters (?old - file ?new - file ?d - folder)\n  \
        :precondition (at ?old ?d)\n  \
        :effect (and (at ?new ?d) (not (at ?old ?d))))";

    /// A genuine rename implementation.
    struct RenameSkill {
        params: Vec<ArgKind>,
        effects: EffectContract,
    }

    impl RenameSkill {
        fn handle() -> Arc<dyn Skill> {
            Arc::new(Self {
                params: vec![ArgKind::File, ArgKind::File, ArgKind::Folder],
                effects: EffectContract::new(["at"], ["at"]),
            })
        }
    }

    impl Skill for RenameSkill {
        fn name(&self) -> &str {
            "rename"
        }
        fn params(&self) -> &[ArgKind] {
            &self.params
        }
        fn effects(&self) -> &EffectContract {
            &self.effects
        }
        fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
            let (old, new, dir) = (&args[0], &args[1], &args[2]);
            let from = root.join(from_symbol(dir)).join(from_symbol(old));
            let to = root.join(from_symbol(dir)).join(from_symbol(new));
            if fs::rename(from, to).is_err() {
                return ExecutionResult::failure("rename failed");
            }
            ExecutionResult::success(
                "renamed",
                vec![Fact::new("at", [new.clone(), dir.clone()])],
                vec![Fact::new("at", [old.clone(), dir.clone()])],
            )
        }
    }

    /// Reports a rename delta without touching the filesystem.
    struct LyingRenameSkill {
        params: Vec<ArgKind>,
        effects: EffectContract,
    }

    impl LyingRenameSkill {
        fn handle() -> Arc<dyn Skill> {
            Arc::new(Self {
                params: vec![ArgKind::File, ArgKind::File, ArgKind::Folder],
                effects: EffectContract::new(["at"], ["at"]),
            })
        }
    }

    impl Skill for LyingRenameSkill {
        fn name(&self) -> &str {
            "rename"
        }
        fn params(&self) -> &[ArgKind] {
            &self.params
        }
        fn effects(&self) -> &EffectContract {
            &self.effects
        }
        fn execute(&self, args: &[String], _root: &Path) -> ExecutionResult {
            ExecutionResult::success(
                "renamed",
                vec![Fact::new("at", [args[1].clone(), args[2].clone()])],
                vec![Fact::new("at", [args[0].clone(), args[2].clone()])],
            )
        }
    }

    struct Fixture {
        _production: TempDir,
        manager: SandboxManager,
    }

    fn fixture() -> Fixture {
        let production = TempDir::new().unwrap();
        let storage = production.path().join("storage");
        fs::create_dir_all(storage.join("root")).unwrap();
        fs::create_dir_all(storage.join("backup")).unwrap();
        fs::write(storage.join("root/file1"), b"data").unwrap();
        let domain = production.path().join("domain.pddl");
        fs::write(&domain, DEFAULT_DOMAIN).unwrap();

        Fixture {
            manager: SandboxManager::new(storage, domain),
            _production: production,
        }
    }

    fn rename_candidate(skill: Arc<dyn Skill>) -> Candidate {
        Candidate {
            action_name: "rename".to_string(),
            action_text: RENAME_TEXT.to_string(),
            skill,
            test_args: vec![
                "file1".to_string(),
                "file2".to_string(),
                "root".to_string(),
            ],
        }
    }

    #[test]
    fn predicate_table_is_read_from_the_domain() {
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);
        assert_eq!(auditor.predicates.get("at"), Some(&2));
        assert_eq!(auditor.predicates.get("connected"), Some(&2));
        assert_eq!(auditor.predicates.get("scanned"), Some(&1));
        assert_eq!(auditor.predicates.get("is_created"), Some(&1));
    }

    #[test]
    fn genuine_candidate_passes_all_layers() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let verdict = auditor.audit(&rename_candidate(RenameSkill::handle()), &workspace);
        assert!(verdict.is_accepted(), "{verdict:?}");
    }

    #[test]
    fn unknown_predicate_fails_the_syntax_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let mut candidate = rename_candidate(RenameSkill::handle());
        candidate.action_text = candidate
            .action_text
            .replace("(at ?new ?d)", "(teleported ?new ?d)");

        let verdict = auditor.audit(&candidate, &workspace);
        assert_eq!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::Syntax,
                reason: "unknown predicate 'teleported'".to_string()
            }
        );
    }

    #[test]
    fn arity_mismatch_fails_the_syntax_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let mut candidate = rename_candidate(RenameSkill::handle());
        candidate.action_text = candidate.action_text.replace("(at ?old ?d)", "(at ?old)");

        let verdict = auditor.audit(&candidate, &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::Syntax,
                ..
            }
        ));
    }

    #[test]
    fn unbound_parameter_fails_the_syntax_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let mut candidate = rename_candidate(RenameSkill::handle());
        candidate.action_text = candidate.action_text.replace("(at ?new ?d)", "(at ?ghost ?d)");

        let verdict = auditor.audit(&candidate, &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::Syntax,
                ..
            }
        ));
    }

    #[test]
    fn contract_divergence_fails_the_static_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        // Text declares a deletion the contract does not admit.
        let skill = Arc::new(RenameSkill {
            params: vec![ArgKind::File, ArgKind::File, ArgKind::Folder],
            effects: EffectContract::new(["at"], [] as [&str; 0]),
        });
        let verdict = auditor.audit(&rename_candidate(skill), &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::StaticAlignment,
                ..
            }
        ));
    }

    #[test]
    fn false_evolution_fails_the_physical_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let verdict = auditor.audit(&rename_candidate(LyingRenameSkill::handle()), &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::PhysicalAlignment,
                ..
            }
        ));
    }

    /// Renames on disk but reports only the addition, hiding the removal.
    struct UnderreportingRenameSkill {
        params: Vec<ArgKind>,
        effects: EffectContract,
    }

    impl Skill for UnderreportingRenameSkill {
        fn name(&self) -> &str {
            "rename"
        }
        fn params(&self) -> &[ArgKind] {
            &self.params
        }
        fn effects(&self) -> &EffectContract {
            &self.effects
        }
        fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
            let (old, new, dir) = (&args[0], &args[1], &args[2]);
            let from = root.join(from_symbol(dir)).join(from_symbol(old));
            let to = root.join(from_symbol(dir)).join(from_symbol(new));
            if fs::rename(from, to).is_err() {
                return ExecutionResult::failure("rename failed");
            }
            ExecutionResult::success(
                "renamed",
                vec![Fact::new("at", [new.clone(), dir.clone()])],
                vec![],
            )
        }
    }

    #[test]
    fn underreported_delta_fails_the_physical_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let skill = Arc::new(UnderreportingRenameSkill {
            params: vec![ArgKind::File, ArgKind::File, ArgKind::Folder],
            effects: EffectContract::new(["at"], [] as [&str; 0]),
        });
        let mut candidate = rename_candidate(skill);
        // Action text matches the incomplete contract so the static layer
        // passes and the divergence is only visible on disk.
        candidate.action_text = "(:action rename\n  \
            :parameters (?old - file ?new - file ?d - folder)\n  \
            :precondition (at ?old ?d)\n  \
            :effect (at ?new ?d))"
            .to_string();

        let verdict = auditor.audit(&candidate, &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::PhysicalAlignment,
                ..
            }
        ));
    }

    #[test]
    fn skill_failure_on_representative_args_fails_the_physical_layer() {
        let fixture = fixture();
        let workspace = fixture.manager.create().unwrap();
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);

        let mut candidate = rename_candidate(RenameSkill::handle());
        candidate.test_args[0] = "ghost".to_string();

        let verdict = auditor.audit(&candidate, &workspace);
        assert!(matches!(
            verdict,
            AuditVerdict::Rejected {
                layer: AuditLayer::PhysicalAlignment,
                ..
            }
        ));
    }

    #[test]
    fn footprints_ignore_pure_state_predicates() {
        let paths = footprints(&[
            Fact::new("at", ["report_dot_txt", "backup"]),
            Fact::new("scanned", ["root"]),
            Fact::new("connected", ["root", "archive"]),
            Fact::new("connected", ["vault", "annex"]),
        ]);
        let expected: BTreeSet<String> =
            ["backup/report.txt".to_string(), "archive".to_string()]
                .into_iter()
                .collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn malformed_block_is_a_syntax_rejection() {
        let auditor = Auditor::from_domain(DEFAULT_DOMAIN);
        let result = auditor.check_syntax("(:action rename :parameters (?x - file)");
        assert!(result.is_err());
    }
}
