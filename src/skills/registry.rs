//! Skill registry keyed by capability name.
//!
//! One entry per name. Registering an existing name replaces the entry,
//! which is how promotion installs a newer revision of a capability.

use super::SkillHandle;
use std::collections::HashMap;

/// Minimum similarity for an "unknown skill" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Registry of executable skills.
///
/// Cloning the registry clones the map but shares the (immutable) skill
/// instances, which is how the sandbox obtains a disjoint registry for a
/// trial without copying skill code.
#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, SkillHandle>,
}

impl SkillRegistry {
    /// Creates a new empty skill registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Registers a skill under its own name, replacing any existing entry.
    pub fn register(&mut self, skill: SkillHandle) {
        let name = skill.name().to_lowercase();
        tracing::debug!(skill = %name, "Skill registered");
        self.skills.insert(name, skill);
    }

    /// Gets a skill by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SkillHandle> {
        self.skills.get(&name.to_lowercase())
    }

    /// Returns true if a skill with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(&name.to_lowercase())
    }

    /// Removes a skill by name, returning it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<SkillHandle> {
        self.skills.remove(&name.to_lowercase())
    }

    /// Returns the number of registered skills.
    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Returns true if no skills are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Lists registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the registered name closest to `name`, if any is similar
    /// enough to be a plausible typo.
    #[must_use]
    pub fn closest_name(&self, name: &str) -> Option<String> {
        let wanted = name.to_lowercase();
        self.skills
            .keys()
            .map(|k| (strsim::jaro_winkler(&wanted, k), k))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, k)| k.clone())
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{ArgKind, EffectContract, ExecutionResult, Skill};
    use std::path::Path;
    use std::sync::Arc;

    struct DummySkill {
        name: String,
        params: Vec<ArgKind>,
        effects: EffectContract,
    }

    impl DummySkill {
        fn named(name: &str) -> Arc<dyn Skill> {
            Arc::new(Self {
                name: name.to_string(),
                params: vec![],
                effects: EffectContract::default(),
            })
        }
    }

    impl Skill for DummySkill {
        fn name(&self) -> &str {
            &self.name
        }
        fn params(&self) -> &[ArgKind] {
            &self.params
        }
        fn effects(&self) -> &EffectContract {
            &self.effects
        }
        fn execute(&self, _args: &[String], _root: &Path) -> ExecutionResult {
            ExecutionResult::success("noop", vec![], vec![])
        }
    }

    #[test]
    fn register_and_get_by_name() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("move"));

        assert!(registry.contains("move"));
        assert!(registry.get("move").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("Move"));

        assert!(registry.contains("MOVE"));
        assert!(registry.get("move").is_some());
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("move"));
        registry.register(DummySkill::named("move"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("scan"));
        registry.register(DummySkill::named("copy"));
        registry.register(DummySkill::named("move"));

        assert_eq!(registry.names(), ["copy", "move", "scan"]);
    }

    #[test]
    fn closest_name_suggests_typo() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("move"));
        registry.register(DummySkill::named("scan"));

        assert_eq!(registry.closest_name("mvoe"), Some("move".to_string()));
    }

    #[test]
    fn closest_name_ignores_dissimilar_names() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("scan"));

        assert_eq!(registry.closest_name("defragment"), None);
    }

    #[test]
    fn clone_shares_skill_instances() {
        let mut registry = SkillRegistry::new();
        registry.register(DummySkill::named("move"));

        let mut cloned = registry.clone();
        cloned.remove("move");

        assert!(registry.contains("move"));
        assert!(!cloned.contains("move"));
    }
}
