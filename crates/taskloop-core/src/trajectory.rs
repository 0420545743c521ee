// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The trajectory store: deep-merge the agent/model/environment
//! serializations plus any extra data, stamp a format/version marker, and
//! write pretty-printed JSON atomically.

use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::AgentError;
use crate::merge::recursive_merge;

pub const TRAJECTORY_FORMAT: &str = "mini-swe-agent-1";

/// Merge `parts` (later wins on scalar/array conflict, nested objects merge
/// key-by-key) and stamp the format/version markers the orchestrator and
/// downstream tooling key off of.
pub fn build(parts: &[Value]) -> Value {
    let mut merged = recursive_merge(parts);
    if let Some(map) = merged.as_object_mut() {
        map.insert("trajectory_format".to_string(), json!(TRAJECTORY_FORMAT));
        let info = map.entry("info").or_insert_with(|| json!({}));
        if let Some(info_map) = info.as_object_mut() {
            info_map.insert("mini_version".to_string(), json!(env!("CARGO_PKG_VERSION")));
        }
    }
    merged
}

/// Write `value` to `path` atomically: write to a temp file in the same
/// directory, then rename over the destination, so a concurrent reader (a
/// batch worker polling for results) never observes a partial write.
/// Creates parent directories if needed.
pub fn write_atomic(path: &Path, value: &Value) -> Result<(), AgentError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| AgentError::Save(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| AgentError::Save(e.to_string()))?;
    let text = serde_json::to_string_pretty(value).map_err(|e| AgentError::Save(e.to_string()))?;
    tmp.write_all(text.as_bytes()).map_err(|e| AgentError::Save(e.to_string()))?;
    tmp.flush().map_err(|e| AgentError::Save(e.to_string()))?;
    tmp.persist(path).map_err(|e| AgentError::Save(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stamps_format_and_version() {
        let result = build(&[json!({"info": {"config": {}}})]);
        assert_eq!(result["trajectory_format"], TRAJECTORY_FORMAT);
        assert!(result["info"]["mini_version"].is_string());
    }

    #[test]
    fn build_merges_nested_info_across_parts() {
        let result = build(&[
            json!({"info": {"config": {"agent": {"step_limit": 0}}}}),
            json!({"info": {"config": {"model": {"model_name": "gpt"}}}}),
            json!({"messages": []}),
        ]);
        assert_eq!(result["info"]["config"]["agent"]["step_limit"], 0);
        assert_eq!(result["info"]["config"]["model"]["model_name"], "gpt");
        assert!(result["messages"].is_array());
    }

    #[test]
    fn write_atomic_creates_parent_dirs_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trajectory.json");
        let value = json!({"a": 1});
        write_atomic(&path, &value).unwrap();
        let read_back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read_back, value);
    }

    #[test]
    fn write_atomic_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.json");
        write_atomic(&path, &json!({"a": 1})).unwrap();
        write_atomic(&path, &json!({"a": 2})).unwrap();
        let read_back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read_back["a"], 2);
    }
}
