// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Deep-merge over JSON values, ported from
//! `original_source/utils/serialize.py::recursive_merge`: later values
//! win, nested objects merge key-by-key instead of being replaced wholesale.

use serde_json::{Map, Value};

pub fn recursive_merge(values: &[Value]) -> Value {
    let mut result = Map::new();
    for value in values {
        let Some(map) = value.as_object() else { continue };
        for (key, value) in map {
            match (result.get(key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    let merged = recursive_merge(&[Value::Object(existing.clone()), Value::Object(incoming.clone())]);
                    result.insert(key.clone(), merged);
                }
                _ => {
                    result.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_scalar_wins() {
        let merged = recursive_merge(&[json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(merged["a"], 2);
    }

    #[test]
    fn nested_objects_merge_instead_of_replacing() {
        let merged = recursive_merge(&[
            json!({"info": {"a": 1, "b": 2}}),
            json!({"info": {"b": 3, "c": 4}}),
        ]);
        assert_eq!(merged["info"]["a"], 1);
        assert_eq!(merged["info"]["b"], 3);
        assert_eq!(merged["info"]["c"], 4);
    }

    #[test]
    fn non_object_values_are_skipped_silently() {
        let merged = recursive_merge(&[json!(null), json!({"a": 1}), json!("not an object")]);
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn three_way_merge_applies_in_order() {
        let merged = recursive_merge(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
        assert_eq!(merged["a"], 3);
    }
}
