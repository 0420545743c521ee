// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds the one concrete `CompletionBackend` the core ships
//! (`taskloop_model::http_backend::HttpBackend`) from config + environment,
//! the CLI's external-collaborator responsibility per spec §1.

use std::sync::Arc;

use taskloop_config::ModelConfig;
use taskloop_model::http_backend::{AuthStyle, HttpBackend};
use taskloop_model::Model;

fn default_base_url() -> &'static str {
    "https://api.openai.com/v1"
}

/// Reads the API key from `model.api_key_env` if set, else `OPENAI_API_KEY`.
fn resolve_api_key(config: &ModelConfig) -> Option<String> {
    let var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
    std::env::var(var).ok()
}

pub fn build_model(config: &ModelConfig) -> Model {
    let api_key = resolve_api_key(config);
    let base_url = config.base_url.as_deref().unwrap_or_else(default_base_url);
    let backend = HttpBackend::new(config.model_name.clone(), api_key, base_url, AuthStyle::Bearer);
    Model::new(config.clone(), Arc::new(backend))
}
