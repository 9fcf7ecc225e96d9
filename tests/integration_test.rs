//! End-to-end tests over the public API: goals, capability gaps, sandbox
//! isolation, and promotion.

use evoplan::domain::DEFAULT_DOMAIN;
use evoplan::evolution::{
    Candidate, CandidateGenerator, CapabilityGap, GenerationError, UnconfiguredGenerator,
};
use evoplan::facts::from_symbol;
use evoplan::prelude::*;
use evoplan::skills::builtins::register_builtins;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const RENAME_TEXT: &str = "(:action rename\n  \
    :parameters (?old - file ?new - file ?d - folder)\n  \
    :precondition (at ?old ?d)\n  \
    :effect (and (at ?new ?d) (not (at ?old ?d))))";

/// Plans move goals directly; plans rename goals only once the domain
/// declares a rename action, reporting the gap otherwise.
struct StubPlanner;

impl Planner for StubPlanner {
    fn plan(&self, domain: &str, problem: &str) -> Result<Plan, PlanError> {
        if problem.contains("(at file2 root)") {
            if domain.contains("(:action rename") {
                return Ok(Plan::new(vec![Action::new(
                    "rename",
                    ["file1", "file2", "root"],
                )]));
            }
            return Err(PlanError::unsolvable(
                Some("rename".to_string()),
                "undeclared action",
            ));
        }
        if problem.contains("(at file1 backup)") {
            return Ok(Plan::new(vec![Action::new(
                "move",
                ["file1", "root", "backup"],
            )]));
        }
        if problem.contains("(at report_dot_txt backup)") {
            return Ok(Plan::new(vec![Action::new(
                "move",
                ["report_dot_txt", "root", "backup"],
            )]));
        }
        Err(PlanError::unsolvable(None, "no stub response"))
    }
}

struct RenameSkill {
    params: Vec<ArgKind>,
    effects: EffectContract,
    /// When set, the skill reports the rename without performing it.
    lie: bool,
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
        if !self.lie {
            let from = root.join(from_symbol(dir)).join(from_symbol(old));
            let to = root.join(from_symbol(dir)).join(from_symbol(new));
            if fs::rename(from, to).is_err() {
                return ExecutionResult::failure("rename failed");
            }
        }
        ExecutionResult::success(
            "renamed",
            vec![Fact::new("at", [new.clone(), dir.clone()])],
            vec![Fact::new("at", [old.clone(), dir.clone()])],
        )
    }
}

struct RenameGenerator {
    lie: bool,
}

impl CandidateGenerator for RenameGenerator {
    fn generate(
        &self,
        _gap: &CapabilityGap,
        _feedback: &[String],
    ) -> Result<Candidate, GenerationError> {
        Ok(Candidate {
            action_name: "rename".to_string(),
            action_text: RENAME_TEXT.to_string(),
            skill: Arc::new(RenameSkill {
                params: vec![ArgKind::File, ArgKind::File, ArgKind::Folder],
                effects: EffectContract::new(["at"], ["at"]),
                lie: self.lie,
            }),
            test_args: vec![
                "file1".to_string(),
                "file2".to_string(),
                "root".to_string(),
            ],
        })
    }
}

struct World {
    _dir: TempDir,
    storage: PathBuf,
    domain: PathBuf,
    regressions: PathBuf,
}

fn world() -> World {
    let dir = TempDir::new().unwrap();
    let storage = dir.path().join("storage");
    fs::create_dir_all(storage.join("root")).unwrap();
    fs::create_dir_all(storage.join("backup")).unwrap();
    fs::write(storage.join("root/file1"), b"data").unwrap();
    fs::write(storage.join("root/report.txt"), b"report").unwrap();

    World {
        storage,
        domain: dir.path().join("domain.pddl"),
        regressions: dir.path().join("regressions.json"),
        _dir: dir,
    }
}

fn session(world: &World, generator: Box<dyn CandidateGenerator>) -> Session {
    let store = DomainStore::new(&world.domain);
    store.ensure_initialized().unwrap();
    let sandbox = SandboxManager::new(&world.storage, store.domain_path());
    let regression = RegressionSuite::load(&world.regressions).unwrap();

    let mut registry = SkillRegistry::new();
    register_builtins(&mut registry);
    let executor = Executor::new(registry, &world.storage);

    let mut session = Session::new(
        Box::new(GroundedTranslator::new("filestate")),
        Box::new(StubPlanner),
        generator,
        store,
        sandbox,
        regression,
        executor,
    )
    .with_evolution_retries(2);
    session.observe_storage();
    session
}

#[test]
fn scenario_a_move_goal_runs_to_satisfied() {
    let world = world();
    let mut session = session(&world, Box::new(UnconfiguredGenerator));

    let report = session.run_goal("move file1 from root to backup").unwrap();

    assert!(report.status.is_satisfied());
    assert_eq!(report.history, ["move"]);
    assert!(session.facts().contains(&Fact::new("at", ["file1", "backup"])));
    assert!(!session.facts().contains(&Fact::new("at", ["file1", "root"])));
    assert!(world.storage.join("backup/file1").is_file());
}

#[test]
fn scenario_b_false_evolution_is_rejected_and_fails_the_goal() {
    let world = world();
    let mut session = session(&world, Box::new(RenameGenerator { lie: true }));

    let report = session.run_goal("rename file1 to file2 in root").unwrap();

    match report.status {
        RunStatus::Failed(FailureReason::Evolution { action, error }) => {
            assert_eq!(action, "rename");
            assert!(error.is_retries_exhausted());
        }
        other => panic!("expected an evolution failure, got {other:?}"),
    }

    // Nothing the lying candidate did reached production.
    assert!(world.storage.join("root/file1").is_file());
    assert!(!world.storage.join("root/file2").exists());
    assert_eq!(fs::read_to_string(&world.domain).unwrap(), DEFAULT_DOMAIN);
}

#[test]
fn scenario_b_genuine_evolution_promotes_and_retries() {
    let world = world();
    let mut session = session(&world, Box::new(RenameGenerator { lie: false }));

    let report = session.run_goal("rename file1 to file2 in root").unwrap();

    assert!(report.status.is_satisfied(), "{:?}", report.status);
    assert!(world.storage.join("root/file2").is_file());
    assert!(!world.storage.join("root/file1").exists());

    // Promotion reached both production artifacts.
    let domain = fs::read_to_string(&world.domain).unwrap();
    assert!(domain.contains("(:action rename"));
    let backup = fs::read_to_string(world.domain.with_extension("pddl.bak")).unwrap();
    assert_eq!(backup, DEFAULT_DOMAIN);

    // The resolved gap became a regression scenario on disk.
    let registry = fs::read_to_string(&world.regressions).unwrap();
    assert!(registry.contains("rename file1 to file2 in root"));
}

#[test]
fn scenario_c_second_sandbox_fails_busy_without_disturbing_the_first() {
    let world = world();
    let store = DomainStore::new(&world.domain);
    store.ensure_initialized().unwrap();
    let manager = SandboxManager::new(&world.storage, store.domain_path());

    let first = manager.create().unwrap();
    fs::write(first.storage_root().join("root/trial-artifact"), b"x").unwrap();

    let second = manager.create();
    assert!(second.unwrap_err().is_busy());

    // The live trial is unaffected by the refused second acquisition.
    assert!(first.storage_root().join("root/trial-artifact").is_file());
    assert!(first.storage_root().join("root/file1").is_file());
}

#[test]
fn trial_mutations_stay_out_of_production_for_every_outcome() {
    let world = world();
    let store = DomainStore::new(&world.domain);
    store.ensure_initialized().unwrap();
    let manager = SandboxManager::new(&world.storage, store.domain_path());

    let mut workspace = manager.create().unwrap();
    fs::write(workspace.storage_root().join("root/planted"), b"x").unwrap();
    fs::remove_file(workspace.storage_root().join("root/file1")).unwrap();
    workspace.destroy();

    assert!(world.storage.join("root/file1").is_file());
    assert!(!world.storage.join("root/planted").exists());
}

#[test]
fn promoting_the_same_candidate_twice_is_idempotent() {
    let world = world();
    let store = DomainStore::new(&world.domain);
    store.ensure_initialized().unwrap();

    let merged = evoplan::domain::inject_action(DEFAULT_DOMAIN, RENAME_TEXT).unwrap();
    store.promote(&merged).unwrap();
    let after_first = store.load().unwrap();

    let merged_again = evoplan::domain::inject_action(&after_first, RENAME_TEXT).unwrap();
    store.promote(&merged_again).unwrap();

    assert_eq!(store.load().unwrap(), after_first);
}

#[test]
fn dotted_filenames_round_trip_through_scan_and_move() {
    let world = world();
    let mut session = session(&world, Box::new(UnconfiguredGenerator));

    assert!(session
        .facts()
        .contains(&Fact::new("at", ["report_dot_txt", "root"])));

    let report = session
        .run_goal("move report.txt from root to backup")
        .unwrap();

    assert!(report.status.is_satisfied());
    assert!(world.storage.join("backup/report.txt").is_file());
    assert!(session
        .facts()
        .contains(&Fact::new("at", ["report_dot_txt", "backup"])));
}

#[test]
fn satisfied_goal_short_circuits_without_dispatching_actions() {
    let world = world();
    let mut session = session(&world, Box::new(UnconfiguredGenerator));

    let report = session.run_goal("scan root").unwrap();

    assert!(report.status.is_satisfied());
    assert!(report.history.is_empty());
}
