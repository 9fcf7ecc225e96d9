//! Command-line entry point: one goal per invocation.

use anyhow::{Context, Result};
use clap::Parser;
use evoplan::config::{self, EvoplanConfig};
use evoplan::evolution::UnconfiguredGenerator;
use evoplan::kernel::logging::{init_logging, LogLevel};
use evoplan::kernel::{KernelConfig, RunStatus, Session};
use evoplan::prelude::*;
use evoplan::remote::{discover_skills, RemoteChannel};
use evoplan::skills::builtins::register_builtins;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "evoplan",
    version,
    about = "Runs one symbolic goal against the tracked storage state"
)]
struct Cli {
    /// The goal to accomplish, e.g. "move report.txt from inbox to archive"
    goal: String,

    /// Configuration file path; defaults to the standard search order
    #[arg(long, env = "EVOPLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Storage root override
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::from_path(path)?,
        None => config::load()?,
    };
    if let Some(storage) = cli.storage {
        config.paths.storage = storage;
    }

    let logging = if cli.verbose {
        config.logging.clone().with_level(LogLevel::Debug)
    } else {
        config.logging.clone()
    };
    init_logging(&logging)?;

    let mut session = build_session(&config)?;
    session.observe_storage();

    let report = session.run_goal(&cli.goal)?;
    println!(
        "{} after {} iteration(s), {} action(s) dispatched",
        match &report.status {
            RunStatus::Satisfied => "Goal satisfied".to_string(),
            RunStatus::Failed(reason) => format!("Goal failed: {reason}"),
            RunStatus::CapabilityGap(gap) =>
                format!("Blocked on missing capability '{}'", gap.missing_action),
        },
        report.iterations,
        report.history.len()
    );
    for action in &report.history {
        println!("  - {action}");
    }

    if !report.status.is_satisfied() {
        std::process::exit(1);
    }
    Ok(())
}

fn build_session(config: &EvoplanConfig) -> Result<Session> {
    std::fs::create_dir_all(&config.paths.storage).with_context(|| {
        format!(
            "cannot create storage root '{}'",
            config.paths.storage.display()
        )
    })?;

    let store = DomainStore::new(&config.paths.domain);
    store.ensure_initialized()?;
    let sandbox = SandboxManager::new(&config.paths.storage, store.domain_path());
    let regression = RegressionSuite::load(&config.paths.regressions)?;

    let mut registry = SkillRegistry::new();
    register_builtins(&mut registry);
    if let Some(remote_config) = &config.remote {
        let channel = Arc::new(RemoteChannel::new(remote_config)?);
        match discover_skills(&channel) {
            Ok(skills) => {
                for skill in skills {
                    registry.register(skill);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Remote skills unavailable, continuing without"),
        }
    }
    let executor = Executor::new(registry, &config.paths.storage);

    let planner = SubprocessPlanner::new(&config.planner.command)
        .with_args(config.planner.args.clone())
        .with_plan_file(&config.planner.plan_file)
        .with_timeout_secs(config.planner.timeout_secs);

    let kernel_config = KernelConfig::new()
        .with_max_iterations(config.kernel.max_iterations)
        .with_max_planner_failures(config.kernel.max_planner_failures);

    Ok(Session::new(
        Box::new(GroundedTranslator::new("filestate")),
        Box::new(planner),
        Box::new(UnconfiguredGenerator),
        store,
        sandbox,
        regression,
        executor,
    )
    .with_kernel_config(kernel_config)
    .with_evolution_retries(config.evolution.max_retries)
    .with_max_capability_gaps(config.evolution.max_capability_gaps))
}
