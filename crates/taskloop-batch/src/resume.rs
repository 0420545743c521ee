// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Idempotent resume: if `redo_existing = false`,
//! instances whose trajectory file already exists and parses as a
//! well-formed trajectory are skipped.

use std::path::{Path, PathBuf};

/// Per-instance trajectory path: `<output_dir>/<instance_id>/<instance_id>.traj.json`,
/// the same per-instance subdirectory layout `preds.json` summarizes.
pub fn trajectory_path(output_dir: &Path, instance_id: &str) -> PathBuf {
    output_dir.join(instance_id).join(format!("{instance_id}.traj.json"))
}

/// A trajectory is well-formed if it parses as JSON and carries a non-null
/// `info.exit_status` — an in-progress or corrupted file does not count,
/// and is re-run.
pub fn is_well_formed_trajectory(path: &Path) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else { return false };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else { return false };
    !value["info"]["exit_status"].is_null()
}

pub fn should_skip(output_dir: &Path, instance_id: &str, redo_existing: bool) -> bool {
    !redo_existing && is_well_formed_trajectory(&trajectory_path(output_dir, instance_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_is_not_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_well_formed_trajectory(&dir.path().join("nope.json")));
    }

    #[test]
    fn file_without_exit_status_is_not_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, json!({"info": {}}).to_string()).unwrap();
        assert!(!is_well_formed_trajectory(&path));
    }

    #[test]
    fn file_with_exit_status_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, json!({"info": {"exit_status": "Submitted"}}).to_string()).unwrap();
        assert!(is_well_formed_trajectory(&path));
    }

    #[test]
    fn should_skip_respects_redo_existing_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = trajectory_path(dir.path(), "inst-1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, json!({"info": {"exit_status": "Submitted"}}).to_string()).unwrap();
        assert!(should_skip(dir.path(), "inst-1", false));
        assert!(!should_skip(dir.path(), "inst-1", true));
    }
}
