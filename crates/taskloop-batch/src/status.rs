// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-instance progress tracking and the `exit_statuses*.yaml` file (spec
//! §4.F "Progress"), serialized by a file-level mutex.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};

/// Live status of one instance, shown in the progress table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Running,
    Submitted,
    Failed,
    Timeout,
    LimitsExceeded,
}

impl Status {
    /// Map a terminal `exit_status` string onto a
    /// progress-table bucket.
    pub fn from_exit_status(exit_status: &str) -> Self {
        match exit_status {
            "Submitted" => Status::Submitted,
            "LimitsExceeded" => Status::LimitsExceeded,
            "ExecutionTimeoutError" => Status::Timeout,
            _ => Status::Failed,
        }
    }
}

/// In-process counts + per-instance status, read by a live progress
/// display. Thread-safe for concurrent worker updates.
#[derive(Default)]
pub struct ProgressTable {
    inner: std::sync::Mutex<BTreeMap<String, Status>>,
}

impl ProgressTable {
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        let inner = ids.into_iter().map(|id| (id, Status::Pending)).collect();
        Self { inner: std::sync::Mutex::new(inner) }
    }

    pub fn set(&self, id: &str, status: Status) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(id.to_string(), status);
        }
    }

    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = BTreeMap::new();
        for status in map.values() {
            *counts.entry(*status).or_insert(0) += 1;
        }
        counts
    }

    pub fn snapshot(&self) -> BTreeMap<String, Status> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}
impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Append-or-update one instance's final exit status in `path`, a single
/// shared YAML map keyed by instance id. Takes an OS-level exclusive lock
/// for the read-modify-write so concurrent workers (or a second orchestrator
/// process) never interleave writes.
pub fn record_exit_status(path: &Path, instance_id: &str, exit_status: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).read(true).write(true).open(path)?;
    FileExt::lock_exclusive(&file)?;

    let mut text = String::new();
    file.read_to_string(&mut text)?;
    let mut map: BTreeMap<String, String> = if text.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_yaml::from_str(&text).unwrap_or_default()
    };
    map.insert(instance_id.to_string(), exit_status.to_string());

    let serialized = serde_yaml::to_string(&map)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.flush()?;
    FileExt::unlock(&file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_table_counts_by_status() {
        let table = ProgressTable::new(["a".to_string(), "b".to_string(), "c".to_string()]);
        table.set("a", Status::Submitted);
        table.set("b", Status::Failed);
        let counts = table.counts();
        assert_eq!(counts[&Status::Submitted], 1);
        assert_eq!(counts[&Status::Failed], 1);
        assert_eq!(counts[&Status::Pending], 1);
    }

    #[test]
    fn record_exit_status_accumulates_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exit_statuses.yaml");
        record_exit_status(&path, "a", "Submitted").unwrap();
        record_exit_status(&path, "b", "LimitsExceeded").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let map: BTreeMap<String, String> = serde_yaml::from_str(&text).unwrap();
        assert_eq!(map["a"], "Submitted");
        assert_eq!(map["b"], "LimitsExceeded");
    }

    #[test]
    fn record_exit_status_overwrites_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exit_statuses.yaml");
        record_exit_status(&path, "a", "Failed").unwrap();
        record_exit_status(&path, "a", "Submitted").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let map: BTreeMap<String, String> = serde_yaml::from_str(&text).unwrap();
        assert_eq!(map["a"], "Submitted");
        assert_eq!(map.len(), 1);
    }
}
