// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod instance_runner;
mod model_factory;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, ModeArg};
use taskloop_batch::{BatchOrchestrator, Instance};
use taskloop_config::{Config, InteractiveMode};
use taskloop_core::Agent;
use taskloop_environment::Environment;
use taskloop_interactive::{InteractiveAgent, InterruptSignal, StdPrompter};

use instance_runner::ConfigInstanceRunner;
use model_factory::build_model;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = taskloop_config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    match &cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Some(Commands::Batch { instances, output_dir, workers, redo_existing }) => {
            if let Some(dir) = output_dir {
                config.batch.output_dir = dir.display().to_string();
            }
            if let Some(w) = workers {
                config.batch.workers = *w;
            }
            if *redo_existing {
                config.batch.redo_existing = true;
            }
            run_batch(config, instances).await
        }
        None => {
            let task = cli.task.clone().context("a TASK argument is required outside of a subcommand")?;
            run_single(config, &cli, &task).await
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("TASKLOOP_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.model.model_name = model.clone();
    }
    if let Some(path) = &cli.output {
        config.agent.output_path = Some(path.display().to_string());
    }
    if let Some(limit) = cli.step_limit {
        config.agent.step_limit = limit;
    }
    if let Some(limit) = cli.cost_limit {
        config.agent.cost_limit = limit;
    }
    if let Some(mode) = cli.effective_mode() {
        config.interactive.mode = match mode {
            ModeArg::Human => InteractiveMode::Human,
            ModeArg::Confirm => InteractiveMode::Confirm,
            ModeArg::Yolo => InteractiveMode::Yolo,
        };
    }
}

async fn run_single(config: Config, cli: &Cli, task: &str) -> anyhow::Result<()> {
    let model = build_model(&config.model);
    let env = Environment::from_config(config.environment.clone()).await?;
    let agent = Agent::new(model, env, config.agent.clone());

    let terminal = if cli.interactive || cli.mode.is_some() {
        let prompter = Box::new(StdPrompter::new());
        let mut interactive =
            InteractiveAgent::new(agent, config.interactive.clone(), prompter, InterruptSignal::from_ctrl_c());
        interactive.run(task).await?
    } else {
        let mut agent = agent;
        agent.run(task).await?
    };

    println!("exit_status: {}", terminal.exit_status);
    if let Some(submission) = &terminal.submission {
        println!("{submission}");
    }
    if terminal.exit_status != "Submitted" {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_batch(config: Config, instances_path: &PathBuf) -> anyhow::Result<()> {
    let instances = load_instances(instances_path)?;
    let runner = Arc::new(ConfigInstanceRunner::new(config.clone()));
    let orchestrator = BatchOrchestrator::new(runner, config.batch.clone(), config.model.model_name.clone());
    let outcomes = orchestrator.run(instances).await?;

    let mut failures = 0usize;
    for outcome in &outcomes {
        let detail = outcome.detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default();
        println!("{}: {:?}{detail}", outcome.id, outcome.status);
        if !matches!(outcome.status, taskloop_batch::Status::Submitted) {
            failures += 1;
        }
    }
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct InstanceSpec {
    id: String,
    task: String,
    #[serde(default)]
    resources: serde_json::Value,
}

fn load_instances(path: &PathBuf) -> anyhow::Result<Vec<Instance>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let specs: Vec<InstanceSpec> = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))?
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {} as YAML", path.display()))?
    };
    Ok(specs
        .into_iter()
        .map(|spec| {
            let mut instance = Instance::new(spec.id, spec.task);
            instance.resources = spec.resources;
            instance
        })
        .collect())
}
