//! Action dispatch against the skill registry.
//!
//! The executor is the only component that mutates the fact-set. It resolves
//! an action to a registered skill, enforces the declared arity, runs the
//! skill against its storage root, and applies the reported fact delta only
//! on success. Every dispatched action name lands in the execution history,
//! success or not, so later audit windows see exactly what ran.

use crate::facts::FactSet;
use crate::planner::Action;
use crate::skills::{ExecutionError, ExecutionResult, SkillRegistry};
use std::path::{Path, PathBuf};

/// Index into the execution history, taken before a trial so the trial's
/// actions can be inspected in isolation afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryMark(usize);

/// Dispatches actions to skills and owns the execution history.
pub struct Executor {
    registry: SkillRegistry,
    storage_root: PathBuf,
    history: Vec<String>,
}

impl Executor {
    /// Creates an executor over a registry and a storage root.
    #[must_use]
    pub fn new(registry: SkillRegistry, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            storage_root: storage_root.into(),
            history: Vec::new(),
        }
    }

    /// Returns the storage root this executor operates on.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Returns the registry, e.g. to register a promoted skill.
    #[must_use]
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Mutable registry access for promotion.
    pub fn registry_mut(&mut self) -> &mut SkillRegistry {
        &mut self.registry
    }

    /// Executes one action, applying its fact delta on success.
    ///
    /// The action name is recorded in the history before the outcome is
    /// known. On skill failure the facts are left untouched and the failure
    /// message is surfaced as a [`SkillRuntime`](ExecutionError) error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for unregistered skills, arity mismatches,
    /// and skills that report failure.
    pub fn execute(
        &mut self,
        action: &Action,
        facts: &mut FactSet,
    ) -> Result<ExecutionResult, ExecutionError> {
        let name = action.name().to_lowercase();
        self.history.push(name.clone());

        let Some(skill) = self.registry.get(&name) else {
            let suggestion = self.registry.closest_name(&name);
            return Err(ExecutionError::unknown_skill(name, suggestion));
        };

        let expected = skill.params().len();
        if action.args().len() != expected {
            return Err(ExecutionError::argument_mismatch(
                name,
                expected,
                action.args().len(),
            ));
        }

        tracing::debug!(action = %action, "Executing action");
        let result = skill.execute(action.args(), &self.storage_root);

        if !result.success {
            tracing::warn!(action = %action, reason = %result.message, "Action failed");
            return Err(ExecutionError::skill_runtime(name, result.message));
        }

        facts.apply(&result.del_facts, &result.add_facts);
        tracing::debug!(
            action = %action,
            added = result.add_facts.len(),
            deleted = result.del_facts.len(),
            "Action succeeded"
        );
        Ok(result)
    }

    /// Returns the full execution history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Takes a watermark of the current history length.
    #[must_use]
    pub fn history_mark(&self) -> HistoryMark {
        HistoryMark(self.history.len())
    }

    /// Returns the actions dispatched since `mark` was taken.
    #[must_use]
    pub fn history_since(&self, mark: HistoryMark) -> &[String] {
        &self.history[mark.0.min(self.history.len())..]
    }

    /// Clears the execution history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Fact;
    use crate::skills::{builtins, ArgKind, EffectContract, Skill};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FailingSkill {
        params: Vec<ArgKind>,
        effects: EffectContract,
    }

    impl Skill for FailingSkill {
        fn name(&self) -> &str {
            "shred"
        }
        fn params(&self) -> &[ArgKind] {
            &self.params
        }
        fn effects(&self) -> &EffectContract {
            &self.effects
        }
        fn execute(&self, _args: &[String], _root: &Path) -> ExecutionResult {
            ExecutionResult::failure("device busy")
        }
    }

    fn fixture() -> (Executor, FactSet, TempDir) {
        let storage = TempDir::new().unwrap();
        std::fs::create_dir(storage.path().join("root")).unwrap();
        std::fs::create_dir(storage.path().join("backup")).unwrap();
        std::fs::write(storage.path().join("root/file1"), b"data").unwrap();

        let mut registry = SkillRegistry::new();
        builtins::register_builtins(&mut registry);
        registry.register(Arc::new(FailingSkill {
            params: vec![ArgKind::File],
            effects: EffectContract::default(),
        }));

        let executor = Executor::new(registry, storage.path());
        let facts: FactSet = [
            Fact::new("at", ["file1", "root"]),
            Fact::new("connected", ["root", "backup"]),
        ]
        .into_iter()
        .collect();
        (executor, facts, storage)
    }

    #[test]
    fn successful_action_applies_fact_delta() {
        let (mut executor, mut facts, _storage) = fixture();
        let action = Action::new("move", ["file1", "root", "backup"]);

        executor.execute(&action, &mut facts).unwrap();

        assert!(facts.contains(&Fact::new("at", ["file1", "backup"])));
        assert!(!facts.contains(&Fact::new("at", ["file1", "root"])));
    }

    #[test]
    fn unknown_skill_carries_suggestion() {
        let (mut executor, mut facts, _storage) = fixture();
        let action = Action::new("mvoe", ["file1", "root", "backup"]);

        let error = executor.execute(&action, &mut facts).unwrap_err();
        assert!(error.is_unknown_skill());
        assert!(error.to_string().contains("did you mean 'move'"));
    }

    #[test]
    fn arity_mismatch_is_rejected_before_dispatch() {
        let (mut executor, mut facts, storage) = fixture();
        let action = Action::new("move", ["file1", "root"]);

        let error = executor.execute(&action, &mut facts).unwrap_err();
        assert!(error.to_string().contains("3 argument"));
        assert!(storage.path().join("root/file1").exists());
    }

    #[test]
    fn skill_failure_leaves_facts_untouched() {
        let (mut executor, mut facts, _storage) = fixture();
        let before = facts.clone();
        let action = Action::new("shred", ["file1"]);

        let error = executor.execute(&action, &mut facts).unwrap_err();
        assert!(error.is_skill_runtime());
        assert_eq!(facts, before);
    }

    #[test]
    fn history_records_every_dispatch_case_normalized() {
        let (mut executor, mut facts, _storage) = fixture();

        let _ = executor.execute(&Action::new("MOVE", ["file1", "root", "backup"]), &mut facts);
        let _ = executor.execute(&Action::new("mvoe", [] as [&str; 0]), &mut facts);

        assert_eq!(executor.history(), ["move", "mvoe"]);
    }

    #[test]
    fn history_mark_windows_later_actions() {
        let (mut executor, mut facts, _storage) = fixture();
        let _ = executor.execute(&Action::new("scan", ["root"]), &mut facts);

        let mark = executor.history_mark();
        let _ = executor.execute(&Action::new("move", ["file1", "root", "backup"]), &mut facts);

        assert_eq!(executor.history_since(mark), ["move"]);
    }

    #[test]
    fn clear_history_empties_the_log() {
        let (mut executor, mut facts, _storage) = fixture();
        let _ = executor.execute(&Action::new("scan", ["root"]), &mut facts);

        executor.clear_history();
        assert!(executor.history().is_empty());
    }
}
