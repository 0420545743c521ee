// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The `preds.json` batch result index: instance id -> `{model_name_or_path, instance_id,
//! model_patch}`, updated after each instance under a file-level lock.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub model_name_or_path: String,
    pub instance_id: String,
    pub model_patch: String,
}

/// Insert or replace `prediction` in the shared `preds.json` map under an
/// OS-level exclusive lock on the file.
pub fn record_prediction(path: &Path, prediction: Prediction) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).read(true).write(true).open(path)?;
    FileExt::lock_exclusive(&file)?;

    let mut text = String::new();
    file.read_to_string(&mut text)?;
    let mut map: BTreeMap<String, Prediction> = if text.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_json::from_str(&text).unwrap_or_default()
    };
    map.insert(prediction.instance_id.clone(), prediction);

    let serialized = serde_json::to_string_pretty(&map)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.flush()?;
    FileExt::unlock(&file)?;
    Ok(())
}

pub fn load_all(path: &Path) -> anyhow::Result<BTreeMap<String, Prediction>> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_prediction_accumulates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.json");
        record_prediction(
            &path,
            Prediction { model_name_or_path: "m".into(), instance_id: "a".into(), model_patch: "diff a".into() },
        )
        .unwrap();
        record_prediction(
            &path,
            Prediction { model_name_or_path: "m".into(), instance_id: "b".into(), model_patch: "diff b".into() },
        )
        .unwrap();
        let all = load_all(&path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"].model_patch, "diff a");
        assert_eq!(all["b"].model_patch, "diff b");
    }

    #[test]
    fn record_prediction_updates_existing_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.json");
        record_prediction(
            &path,
            Prediction { model_name_or_path: "m".into(), instance_id: "a".into(), model_patch: "first".into() },
        )
        .unwrap();
        record_prediction(
            &path,
            Prediction { model_name_or_path: "m".into(), instance_id: "a".into(), model_patch: "second".into() },
        )
        .unwrap();
        let all = load_all(&path).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["a"].model_patch, "second");
    }
}
