//! OpenAI-compatible chat-completions client.
//!
//! Serves OpenAI itself plus every provider exposing the same protocol
//! (Zhipu, DeepSeek, Moonshot, Alibaba DashScope, MiniMax). The structured
//! result is requested in one of three dialects, picked by
//! [`ModelConfig::mode`]:
//!
//! - `tools` — a single function whose parameters are the analysis schema,
//!   forced via `tool_choice`; the result is the call's `arguments`
//! - `json` — `response_format: json_object`; the result is the message body
//! - `native` — `response_format: json_schema` with the analysis schema

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::http::{
    TOOL_DESCRIPTION, TOOL_NAME, analysis_schema, check_status, default_http_client,
    parse_json_text, transport_error,
};
use super::traits::ProviderClient;
use crate::types::{ModelConfig, RawCompletion, StructuredMode, Usage};
use crate::{HuginnError, Result};

/// Client for `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
}

impl Default for OpenAiCompatibleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatibleClient {
    pub fn new() -> Self {
        Self::with_http_client(default_http_client())
    }

    /// Share a connection pool with other clients.
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    fn request_body(config: &ModelConfig, prompt: &str) -> Value {
        let mut body = json!({
            "model": config.model_name,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });
        match config.mode() {
            StructuredMode::Tools => {
                body["tools"] = json!([{
                    "type": "function",
                    "function": {
                        "name": TOOL_NAME,
                        "description": TOOL_DESCRIPTION,
                        "parameters": analysis_schema(),
                    }
                }]);
                body["tool_choice"] = json!({"type": "function", "function": {"name": TOOL_NAME}});
            }
            StructuredMode::Json => {
                body["response_format"] = json!({"type": "json_object"});
            }
            StructuredMode::Native => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": {"name": TOOL_NAME, "schema": analysis_schema()},
                });
            }
        }
        body
    }

    fn extract_payload(mode: StructuredMode, message: ResponseMessage) -> Result<Value> {
        if mode == StructuredMode::Tools {
            if let Some(call) = message
                .tool_calls
                .into_iter()
                .find(|c| c.function.name == TOOL_NAME)
            {
                return parse_json_text(&call.function.arguments);
            }
            // Some compatible servers ignore tool_choice and answer in the body.
            debug!("no tool call in response, falling back to message content");
        }
        match message.content {
            Some(text) if !text.trim().is_empty() => parse_json_text(&text),
            _ => Err(HuginnError::Format("response carried no structured payload".into())),
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, config: &ModelConfig, prompt: &str) -> Result<RawCompletion> {
        let url = format!("{}/chat/completions", config.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(&Self::request_body(config, prompt))
            .send()
            .await
            .map_err(|e| transport_error(config, e))?;
        let response = check_status(config, response).await?;

        let body: ChatCompletion = response
            .json()
            .await
            .map_err(|e| HuginnError::Format(format!("unexpected response shape: {e}")))?;
        let message = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| HuginnError::Format("response has no choices".into()))?;

        Ok(RawCompletion {
            payload: Self::extract_payload(config.mode(), message)?,
            usage: body
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;

    #[test]
    fn tools_mode_forces_the_analysis_function() {
        let config = ModelConfig::new(ProviderKind::OpenAi, "gpt-4o-mini", "k");
        let body = OpenAiCompatibleClient::request_body(&config, "hi");
        assert_eq!(body["tool_choice"]["function"]["name"], TOOL_NAME);
        assert!(body["tools"][0]["function"]["parameters"]["properties"]["sentiment"].is_object());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn json_mode_for_moonshot() {
        let config = ModelConfig::new(ProviderKind::Moonshot, "moonshot-v1-8k", "k");
        let body = OpenAiCompatibleClient::request_body(&config, "hi");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn native_mode_embeds_schema() {
        let config = ModelConfig::new(ProviderKind::OpenAi, "gpt-4o", "k")
            .with_mode(StructuredMode::Native);
        let body = OpenAiCompatibleClient::request_body(&config, "hi");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert!(body["response_format"]["json_schema"]["schema"].is_object());
    }
}
