// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Bounded-parallel batch execution over a list of instances:
//! a semaphore-gated `JoinSet` schedules work, a shared progress table
//! tracks state, and cooperative Ctrl+C cancellation lets in-flight work
//! finish before the scheduler stops.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use taskloop_config::BatchConfig;

use crate::instance::{filter_instances, Instance};
use crate::preds::{record_prediction, Prediction};
use crate::resume::{should_skip, trajectory_path};
use crate::runner::{BatchError, InstanceRunner};
use crate::status::{record_exit_status, ProgressTable, Status};

/// Outcome of one instance, used for the final summary.
#[derive(Debug)]
pub struct InstanceOutcome {
    pub id: String,
    pub status: Status,
    pub detail: Option<String>,
}

pub struct BatchOrchestrator<R: InstanceRunner + 'static> {
    runner: Arc<R>,
    config: BatchConfig,
    model_name_or_path: String,
}

/// Cooperative cancellation state: the first
/// Ctrl+C stops scheduling new instances but lets in-flight ones finish;
/// the second aborts the whole JoinSet immediately.
#[derive(Clone, Default)]
struct CancelState(Arc<AtomicUsize>);

impl CancelState {
    fn request(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
    fn level(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<R: InstanceRunner + 'static> BatchOrchestrator<R> {
    pub fn new(runner: Arc<R>, config: BatchConfig, model_name_or_path: impl Into<String>) -> Self {
        Self { runner, config, model_name_or_path: model_name_or_path.into() }
    }

    /// Run `instances` to completion: filter, resume-skip, schedule up to
    /// `config.workers` concurrently, and persist exit statuses + the
    /// `preds.json` result index as each instance finishes.
    pub async fn run(&self, instances: Vec<Instance>) -> anyhow::Result<Vec<InstanceOutcome>> {
        let instances = filter_instances(instances, &self.config)?;
        let output_dir = PathBuf::from(&self.config.output_dir);
        let status_path = output_dir.join("exit_statuses.yaml");
        let preds_path = output_dir.join("preds.json");

        let mut scheduled = Vec::new();
        let mut outcomes = Vec::new();
        for instance in instances {
            if should_skip(&output_dir, &instance.id, self.config.redo_existing) {
                tracing::info!(instance = %instance.id, "skipping, trajectory already complete");
                outcomes.push(InstanceOutcome { id: instance.id, status: Status::Submitted, detail: None });
                continue;
            }
            scheduled.push(instance);
        }

        let progress = Arc::new(ProgressTable::new(scheduled.iter().map(|i| i.id.clone())));
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let cancel = CancelState::default();

        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                let level = cancel_for_signal.request();
                if level == 1 {
                    tracing::warn!("interrupt received: finishing in-flight instances, scheduling no new ones");
                } else {
                    tracing::warn!("second interrupt: aborting immediately");
                    break;
                }
            }
        });

        let mut join_set = JoinSet::new();
        for instance in scheduled {
            if cancel.level() >= 1 {
                progress.set(&instance.id, Status::Failed);
                outcomes.push(InstanceOutcome {
                    id: instance.id,
                    status: Status::Failed,
                    detail: Some("cancelled before start".to_string()),
                });
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let runner = self.runner.clone();
            let progress = progress.clone();
            let status_path = status_path.clone();
            let preds_path = preds_path.clone();
            let model_name = self.model_name_or_path.clone();
            let traj_path = trajectory_path(&output_dir, &instance.id);
            let id = instance.id.clone();

            join_set.spawn(async move {
                let _permit = permit;
                progress.set(&id, Status::Running);
                let result = runner.run_instance(&instance, traj_path).await;
                let (status, detail, submission) = match &result {
                    Ok(terminal) => (Status::from_exit_status(&terminal.exit_status), None, terminal.submission.clone()),
                    Err(e) => (Status::Failed, Some(e.to_string()), None),
                };
                progress.set(&id, status);
                let exit_status_str = match &result {
                    Ok(t) => t.exit_status.clone(),
                    Err(_) => "Failed".to_string(),
                };
                if let Err(e) = record_exit_status(&status_path, &id, &exit_status_str) {
                    tracing::warn!(instance = %id, error = %e, "failed to record exit status");
                }
                if let Err(e) = record_prediction(
                    &preds_path,
                    Prediction {
                        model_name_or_path: model_name,
                        instance_id: id.clone(),
                        model_patch: submission.unwrap_or_default(),
                    },
                ) {
                    tracing::warn!(instance = %id, error = %e, "failed to record prediction");
                }
                InstanceOutcome { id, status, detail }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if cancel.level() >= 2 {
                join_set.abort_all();
            }
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    tracing::error!(error = %join_error, "instance task panicked; isolating and continuing");
                    outcomes.push(InstanceOutcome {
                        id: "<unknown>".to_string(),
                        status: Status::Failed,
                        detail: Some(BatchError::Panicked.to_string()),
                    });
                }
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use taskloop_core::TerminalInfo;

    struct CountingRunner {
        calls: AtomicU32,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl InstanceRunner for CountingRunner {
        async fn run_instance(&self, instance: &Instance, _output_path: PathBuf) -> Result<TerminalInfo, BatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&instance.id) {
                return Err(BatchError::Build("boom".to_string()));
            }
            Ok(TerminalInfo { exit_status: "Submitted".to_string(), submission: Some(format!("patch-{}", instance.id)) })
        }
    }

    #[tokio::test]
    async fn runs_all_instances_and_writes_preds() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CountingRunner { calls: AtomicU32::new(0), fail_ids: vec![] });
        let config = BatchConfig { workers: 2, output_dir: dir.path().display().to_string(), ..BatchConfig::default() };
        let orchestrator = BatchOrchestrator::new(runner.clone(), config, "mock-model");
        let instances = vec![Instance::new("a", "do a"), Instance::new("b", "do b"), Instance::new("c", "do c")];
        let outcomes = orchestrator.run(instances).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);

        let preds = crate::preds::load_all(&dir.path().join("preds.json")).unwrap();
        assert_eq!(preds.len(), 3);
        assert_eq!(preds["a"].model_patch, "patch-a");
    }

    #[tokio::test]
    async fn resume_skips_instances_with_existing_trajectory() {
        let dir = tempfile::tempdir().unwrap();
        let traj = trajectory_path(dir.path(), "a");
        std::fs::create_dir_all(traj.parent().unwrap()).unwrap();
        std::fs::write(&traj, serde_json::json!({"info": {"exit_status": "Submitted"}}).to_string()).unwrap();

        let runner = Arc::new(CountingRunner { calls: AtomicU32::new(0), fail_ids: vec![] });
        let config = BatchConfig {
            workers: 2,
            output_dir: dir.path().display().to_string(),
            redo_existing: false,
            ..BatchConfig::default()
        };
        let orchestrator = BatchOrchestrator::new(runner.clone(), config, "mock-model");
        let instances = vec![Instance::new("a", "do a"), Instance::new("b", "do b")];
        let outcomes = orchestrator.run(instances).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1, "a should have been skipped");
    }

    #[tokio::test]
    async fn one_instance_failure_does_not_abort_others() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CountingRunner { calls: AtomicU32::new(0), fail_ids: vec!["b".to_string()] });
        let config = BatchConfig { workers: 2, output_dir: dir.path().display().to_string(), ..BatchConfig::default() };
        let orchestrator = BatchOrchestrator::new(runner.clone(), config, "mock-model");
        let instances = vec![Instance::new("a", "do a"), Instance::new("b", "do b"), Instance::new("c", "do c")];
        let outcomes = orchestrator.run(instances).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        let failed: Vec<_> = outcomes.iter().filter(|o| o.status == Status::Failed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "b");
    }
}
