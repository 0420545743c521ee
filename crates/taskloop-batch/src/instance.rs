// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! One task unit the orchestrator schedules
//! plus the filter/slice/shuffle pipeline applied before scheduling
//!.

use regex::Regex;
use taskloop_config::BatchConfig;

/// One task the batch orchestrator runs: an id and a problem statement.
/// `resources` carries anything instance-specific the caller's
/// `InstanceRunner` needs to build an `Environment` (e.g. a repo path or
/// container image), opaque to this crate.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: String,
    pub task: String,
    pub resources: serde_json::Value,
}

impl Instance {
    pub fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self { id: id.into(), task: task.into(), resources: serde_json::Value::Null }
    }
}

/// A small deterministic PRNG (xorshift64*) used only for the batch
/// shuffle — no external dependency needed for a seeded Fisher-Yates.
struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_add(0x9E3779B97F4A7C15) | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            (self.next_u64() % n as u64) as usize
        }
    }
}

/// Apply `instance_filter` (regex on id), `slice_start`/`slice_end`, and
/// `shuffle_seed` in that order, matching the spec's Filter responsibility.
pub fn filter_instances(instances: Vec<Instance>, config: &BatchConfig) -> anyhow::Result<Vec<Instance>> {
    let mut instances = instances;

    if let Some(pattern) = &config.instance_filter {
        let re = Regex::new(pattern)?;
        instances.retain(|i| re.is_match(&i.id));
    }

    let start = config.slice_start.unwrap_or(0).min(instances.len());
    let end = config.slice_end.unwrap_or(instances.len()).min(instances.len()).max(start);
    instances = instances[start..end].to_vec();

    if let Some(seed) = config.shuffle_seed {
        let mut rng = Xorshift64::new(seed);
        for i in (1..instances.len()).rev() {
            let j = rng.below(i + 1);
            instances.swap(i, j);
        }
    }

    Ok(instances)
}
