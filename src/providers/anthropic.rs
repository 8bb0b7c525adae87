//! Anthropic Messages API client.
//!
//! Always uses forced tool use: the analysis schema is the tool's
//! `input_schema` and the result is the `tool_use` block's `input`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::http::{
    TOOL_DESCRIPTION, TOOL_NAME, analysis_schema, check_status, default_http_client,
    transport_error,
};
use super::traits::ProviderClient;
use crate::types::{ModelConfig, RawCompletion, Usage};
use crate::{HuginnError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for `POST {base_url}/messages`.
#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self::with_http_client(default_http_client())
    }

    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    fn request_body(config: &ModelConfig, prompt: &str) -> Value {
        json!({
            "model": config.model_name,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "messages": [{"role": "user", "content": prompt}],
            "tools": [{
                "name": TOOL_NAME,
                "description": TOOL_DESCRIPTION,
                "input_schema": analysis_schema(),
            }],
            "tool_choice": {"type": "tool", "name": TOOL_NAME},
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, config: &ModelConfig, prompt: &str) -> Result<RawCompletion> {
        let url = format!("{}/messages", config.base_url());
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::request_body(config, prompt))
            .send()
            .await
            .map_err(|e| transport_error(config, e))?;
        let response = check_status(config, response).await?;

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| HuginnError::Format(format!("unexpected response shape: {e}")))?;

        let payload = body
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { name, input } if name == TOOL_NAME => Some(input),
                _ => None,
            })
            .ok_or_else(|| HuginnError::Format("response has no tool_use block".into()))?;
        if !payload.is_object() {
            return Err(HuginnError::Format("tool input is not an object".into()));
        }

        Ok(RawCompletion {
            payload,
            usage: body
                .usage
                .map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        })
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
