// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Generic OpenAI-compatible HTTP completion backend.
//!
//! A single provider that speaks the `/chat/completions` wire format
//! shared by most hosted and self-hosted model servers, configured with
//! its own base URL, auth style, and extra body fields. This is the one
//! concrete [`CompletionBackend`] the core ships, serving as the
//! reference transport; a real deployment is expected to add
//! provider-specific backends behind the same trait (specific
//! provider transports beyond the abstract contract are out of scope).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::dialect::toolcall::RawToolCall;
use crate::error::ModelError;
use crate::provider::{CompletionBackend, CompletionResponse, Usage};

/// How the API key is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    ApiKeyHeader,
    None,
}

pub struct HttpBackend {
    model: String,
    api_key: Option<String>,
    chat_url: String,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl HttpBackend {
    /// `base_url` ends before `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(model: String, api_key: Option<String>, base_url: &str, auth_style: AuthStyle) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            auth_style,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<CompletionResponse, ModelError> {
        let mut body = json!({ "model": self.model, "messages": messages, "stream": false });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let mut req = self.client.post(&self.chat_url).json(&body);
        req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    ModelError::Authentication("no API key configured".to_string())
                })?;
                req.bearer_auth(key)
            }
            AuthStyle::ApiKeyHeader => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    ModelError::Authentication("no API key configured".to_string())
                })?;
                req.header("api-key", key)
            }
            AuthStyle::None => req,
        };

        let resp = req.send().await.map_err(|e| ModelError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_error(status, &text));
        }

        let payload: Value = resp.json().await.map_err(|e| ModelError::Transient(e.to_string()))?;
        parse_response(payload)
    }
}

fn classify_http_error(status: StatusCode, text: &str) -> ModelError {
    match status {
        StatusCode::UNAUTHORIZED => ModelError::Authentication(text.to_string()),
        StatusCode::FORBIDDEN => ModelError::PermissionDenied(text.to_string()),
        StatusCode::NOT_FOUND => ModelError::NotFound(text.to_string()),
        StatusCode::BAD_REQUEST if text.to_lowercase().contains("context") => {
            ModelError::ContextWindowExceeded(text.to_string())
        }
        StatusCode::BAD_REQUEST => ModelError::UnsupportedParams(text.to_string()),
        _ => ModelError::Transient(format!("{status}: {text}")),
    }
}

fn parse_response(payload: Value) -> Result<CompletionResponse, ModelError> {
    let choice = payload["choices"].get(0).ok_or_else(|| {
        ModelError::Transient("response contained no choices".to_string())
    })?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    Some(RawToolCall {
                        id: tc["id"].as_str()?.to_string(),
                        name: tc["function"]["name"].as_str()?.to_string(),
                        arguments: tc["function"]["arguments"].as_str().unwrap_or("{}").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage_obj = &payload["usage"];
    let usage = Usage {
        prompt_tokens: usage_obj["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: usage_obj["completion_tokens"].as_u64().unwrap_or(0) as u32,
        total_tokens: usage_obj["total_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(CompletionResponse { content, tool_calls, usage, raw: payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_401_as_authentication() {
        assert!(matches!(
            classify_http_error(StatusCode::UNAUTHORIZED, "bad key"),
            ModelError::Authentication(_)
        ));
    }

    #[test]
    fn classify_404_as_not_found() {
        assert!(matches!(classify_http_error(StatusCode::NOT_FOUND, "x"), ModelError::NotFound(_)));
    }

    #[test]
    fn classify_429_as_transient() {
        assert!(matches!(
            classify_http_error(StatusCode::TOO_MANY_REQUESTS, "rate limited"),
            ModelError::Transient(_)
        ));
    }

    #[test]
    fn classify_context_length_error() {
        assert!(matches!(
            classify_http_error(StatusCode::BAD_REQUEST, "maximum context length exceeded"),
            ModelError::ContextWindowExceeded(_)
        ));
    }

    #[test]
    fn parse_response_extracts_content_and_usage() {
        let payload = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp = parse_response(payload).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.usage.total_tokens, 15);
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn parse_response_extracts_tool_calls() {
        let payload = json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call-1", "function": {"name": "bash", "arguments": "{\"command\":\"ls\"}"}}
            ]}}],
            "usage": {}
        });
        let resp = parse_response(payload).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call-1");
    }

    #[test]
    fn parse_response_missing_choices_is_transient_error() {
        let err = parse_response(json!({})).unwrap_err();
        assert!(matches!(err, ModelError::Transient(_)));
    }
}
