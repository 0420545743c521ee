// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Interactive mode override for a single run (mirrors
/// `taskloop_config::InteractiveMode`, kept separate so clap owns its own
/// `ValueEnum` impl rather than reaching into the config crate for one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Human,
    Confirm,
    Yolo,
}

#[derive(Parser, Debug)]
#[command(
    name = "taskloop",
    about = "Drives a language model in a loop against a shell environment until it submits or a limit is hit",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// The task description for a single run. Required unless a subcommand
    /// is given.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to a config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Model name override, e.g. "gpt-4o" or "anthropic/claude-opus-4-5".
    #[arg(long, short = 'm', env = "TASKLOOP_MODEL")]
    pub model: Option<String>,

    /// Drive the run through the interactive variant (human/confirm/yolo)
    /// instead of the plain unattended loop.
    #[arg(long)]
    pub interactive: bool,

    /// Interactive mode, implies --interactive.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Write the trajectory to this path instead of the configured
    /// `agent.output_path`.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Maximum number of model calls (0 = no limit).
    #[arg(long)]
    pub step_limit: Option<u32>,

    /// Maximum cumulative cost in USD (0.0 = no limit).
    #[arg(long)]
    pub cost_limit: Option<f64>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run many instances concurrently.
    Batch {
        /// JSON or YAML file containing an array of `{id, task}` instances.
        #[arg(value_name = "INSTANCES")]
        instances: PathBuf,
        /// Directory for per-instance trajectories, `preds.json`, and
        /// `exit_statuses.yaml`. Overrides `batch.output_dir`.
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
        /// Number of instances to run concurrently. Overrides `batch.workers`.
        #[arg(long, short = 'w')]
        workers: Option<usize>,
        /// Re-run instances that already have a well-formed trajectory.
        #[arg(long)]
        redo_existing: bool,
    },
    /// Print the effective merged configuration as YAML and exit.
    ShowConfig,
}

impl Cli {
    pub fn effective_mode(&self) -> Option<ModeArg> {
        self.mode
    }
}
