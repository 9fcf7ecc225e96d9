//! Built-in filesystem skills.
//!
//! These are the capabilities the registry starts with: observation (`scan`)
//! and the basic file manipulations. The storage layout is flat: every
//! top-level directory under the storage root is a location symbol, and
//! `(at f d)` means file `f` lives directly inside directory `d`. All paths
//! go through [`resolve_under`], so a skill cannot touch anything outside
//! the root it is handed.

use super::path::resolve_under;
use super::{ArgKind, EffectContract, ExecutionResult, Skill, SkillHandle, SkillRegistry};
use crate::facts::{to_symbol, Fact};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Registers every built-in skill into `registry`.
pub fn register_builtins(registry: &mut SkillRegistry) {
    registry.register(scan());
    registry.register(move_file());
    registry.register(copy_file());
    registry.register(remove_file());
    registry.register(create_file());
    registry.register(create_folder());
}

/// The `scan` skill: observe one location.
#[must_use]
pub fn scan() -> SkillHandle {
    Arc::new(ScanSkill {
        params: vec![ArgKind::Folder],
        effects: EffectContract::new(["at", "connected", "scanned"], [] as [&str; 0]),
    })
}

/// The `move` skill.
#[must_use]
pub fn move_file() -> SkillHandle {
    Arc::new(MoveSkill {
        params: vec![ArgKind::File, ArgKind::Folder, ArgKind::Folder],
        effects: EffectContract::new(["at"], ["at"]),
    })
}

/// The `copy` skill.
#[must_use]
pub fn copy_file() -> SkillHandle {
    Arc::new(CopySkill {
        params: vec![ArgKind::File, ArgKind::Folder, ArgKind::Folder],
        effects: EffectContract::new(["at"], [] as [&str; 0]),
    })
}

/// The `remove_file` skill.
#[must_use]
pub fn remove_file() -> SkillHandle {
    Arc::new(RemoveSkill {
        params: vec![ArgKind::File, ArgKind::Folder],
        effects: EffectContract::new([] as [&str; 0], ["at"]),
    })
}

/// The `create_file` skill.
#[must_use]
pub fn create_file() -> SkillHandle {
    Arc::new(CreateFileSkill {
        params: vec![ArgKind::File, ArgKind::Folder],
        effects: EffectContract::new(["at", "is_created"], [] as [&str; 0]),
    })
}

/// The `create_folder` skill.
#[must_use]
pub fn create_folder() -> SkillHandle {
    Arc::new(CreateFolderSkill {
        params: vec![ArgKind::Folder],
        effects: EffectContract::new(["connected", "is_created"], [] as [&str; 0]),
    })
}

struct ScanSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for ScanSkill {
    fn name(&self) -> &str {
        "scan"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let location = &args[0];
        let dir = match resolve_under(root, &[location]) {
            Ok(dir) => dir,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                return ExecutionResult::failure(format!(
                    "cannot scan '{location}': {e}"
                ))
            }
        };

        let mut add_facts = vec![Fact::new("scanned", [location.as_str()])];
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if entry.path().is_file() {
                add_facts.push(Fact::new("at", [to_symbol(name), location.clone()]));
            }
        }

        // Connectivity is flat: every other top-level directory under the
        // storage root is reachable from the scanned location.
        if let Ok(siblings) = fs::read_dir(root) {
            for entry in siblings.flatten() {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                let sibling = to_symbol(name);
                if entry.path().is_dir() && sibling != *location {
                    add_facts.push(Fact::new("connected", [location.clone(), sibling.clone()]));
                    add_facts.push(Fact::new("connected", [sibling, location.clone()]));
                }
            }
        }

        tracing::debug!(location = %location, facts = add_facts.len(), "Scan complete");
        ExecutionResult::success(format!("scanned '{location}'"), add_facts, vec![])
    }
}

struct MoveSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for MoveSkill {
    fn name(&self) -> &str {
        "move"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let (file, from, to) = (&args[0], &args[1], &args[2]);
        let source = match resolve_under(root, &[from, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };
        let target = match resolve_under(root, &[to, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        if !source.is_file() {
            return ExecutionResult::failure(format!("'{file}' is not present in '{from}'"));
        }

        if let Err(e) = fs::rename(&source, &target) {
            return ExecutionResult::failure(format!("cannot move '{file}': {e}"));
        }

        ExecutionResult::success(
            format!("moved '{file}' from '{from}' to '{to}'"),
            vec![Fact::new("at", [file.clone(), to.clone()])],
            vec![Fact::new("at", [file.clone(), from.clone()])],
        )
    }
}

struct CopySkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for CopySkill {
    fn name(&self) -> &str {
        "copy"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let (file, from, to) = (&args[0], &args[1], &args[2]);
        let source = match resolve_under(root, &[from, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };
        let target = match resolve_under(root, &[to, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        if !source.is_file() {
            return ExecutionResult::failure(format!("'{file}' is not present in '{from}'"));
        }

        if let Err(e) = fs::copy(&source, &target) {
            return ExecutionResult::failure(format!("cannot copy '{file}': {e}"));
        }

        ExecutionResult::success(
            format!("copied '{file}' from '{from}' to '{to}'"),
            vec![Fact::new("at", [file.clone(), to.clone()])],
            vec![],
        )
    }
}

struct RemoveSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for RemoveSkill {
    fn name(&self) -> &str {
        "remove_file"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let (file, dir) = (&args[0], &args[1]);
        let path = match resolve_under(root, &[dir, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        if let Err(e) = fs::remove_file(&path) {
            return ExecutionResult::failure(format!("cannot remove '{file}': {e}"));
        }

        ExecutionResult::success(
            format!("removed '{file}' from '{dir}'"),
            vec![],
            vec![Fact::new("at", [file.clone(), dir.clone()])],
        )
    }
}

struct CreateFileSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for CreateFileSkill {
    fn name(&self) -> &str {
        "create_file"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let (file, dir) = (&args[0], &args[1]);
        let path = match resolve_under(root, &[dir, file]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        if path.exists() {
            return ExecutionResult::failure(format!("'{file}' already exists in '{dir}'"));
        }

        if let Err(e) = fs::write(&path, b"") {
            return ExecutionResult::failure(format!("cannot create '{file}': {e}"));
        }

        ExecutionResult::success(
            format!("created '{file}' in '{dir}'"),
            vec![
                Fact::new("at", [file.clone(), dir.clone()]),
                Fact::new("is_created", [file.clone()]),
            ],
            vec![],
        )
    }
}

struct CreateFolderSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
}

impl Skill for CreateFolderSkill {
    fn name(&self) -> &str {
        "create_folder"
    }

    fn params(&self) -> &[ArgKind] {
        &self.params
    }

    fn effects(&self) -> &EffectContract {
        &self.effects
    }

    fn execute(&self, args: &[String], root: &Path) -> ExecutionResult {
        let dir = &args[0];
        let path = match resolve_under(root, &[dir]) {
            Ok(p) => p,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };

        if path.exists() {
            return ExecutionResult::failure(format!("folder '{dir}' already exists"));
        }

        if let Err(e) = fs::create_dir(&path) {
            return ExecutionResult::failure(format!("cannot create folder '{dir}': {e}"));
        }

        ExecutionResult::success(
            format!("created folder '{dir}'"),
            vec![
                Fact::new("connected", ["root", dir.as_str()]),
                Fact::new("connected", [dir.as_str(), "root"]),
                Fact::new("is_created", [dir.as_str()]),
            ],
            vec![],
        )
    }
}
