// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Strict-undefined textual templating.
//!
//! `render` is pure and stateless: given a template string and a flat
//! variable map, it renders the template or fails with [`FormatError`] if
//! the template references a variable not present in the map. Used to
//! render system/instance prompts, observation bodies, and format-error
//! messages.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("template error: {0}")]
pub struct FormatError(pub String);

/// Render `template` against `vars`, failing on any unresolved variable.
///
/// `vars` is typically built with `serde_json::json!({...})`; any
/// serializable value works as the top-level context.
pub fn render(template: &str, vars: &Value) -> Result<String, FormatError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("t", template)
        .map_err(|e| FormatError(e.to_string()))?;
    let tmpl = env.get_template("t").map_err(|e| FormatError(e.to_string()))?;
    tmpl.render(vars).map_err(|e| FormatError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_substitution() {
        let out = render("hello {{ name }}", &json!({"name": "world"})).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn unbound_variable_is_format_error() {
        let err = render("{{ missing }}", &json!({})).unwrap_err();
        assert!(err.0.contains("undefined") || err.0.contains("missing") || !err.0.is_empty());
    }

    #[test]
    fn conditional_and_filters() {
        let out = render(
            "{% if actions|length == 0 %}none{% else %}{{ actions|length }}{% endif %}",
            &json!({"actions": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn no_vars_returns_content_unchanged() {
        let out = render("static text", &json!({})).unwrap();
        assert_eq!(out, "static text");
    }

    #[test]
    fn nested_field_access() {
        let out = render(
            "<returncode>{{ output.returncode }}</returncode>",
            &json!({"output": {"returncode": 0}}),
        )
        .unwrap();
        assert_eq!(out, "<returncode>0</returncode>");
    }
}
