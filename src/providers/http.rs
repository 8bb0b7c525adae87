//! HTTP plumbing shared by the provider clients.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::types::{AnalysisResult, ModelConfig};
use crate::{HuginnError, Result};

/// Name of the function/tool whose arguments carry the result.
pub(crate) const TOOL_NAME: &str = "record_analysis";

pub(crate) const TOOL_DESCRIPTION: &str =
    "Record the structured analysis of the voice transcription.";

static SCHEMA: LazyLock<serde_json::Value> = LazyLock::new(AnalysisResult::json_schema);

/// JSON schema of [`AnalysisResult`], computed once.
pub(crate) fn analysis_schema() -> &'static serde_json::Value {
    &SCHEMA
}

/// Shared HTTP client with a conservative overall timeout.
///
/// The gateway enforces the per-attempt timeout from [`ModelConfig`]; this
/// one only guards against connections that never complete.
pub(crate) fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_default()
}

pub(crate) fn transport_error(config: &ModelConfig, e: reqwest::Error) -> HuginnError {
    if e.is_timeout() {
        HuginnError::Timeout(config.timeout)
    } else {
        HuginnError::Http(e.to_string())
    }
}

/// Map a non-success response to the error taxonomy; pass successes through.
pub(crate) async fn check_status(config: &ModelConfig, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HuginnError::AuthenticationFailed {
            provider: config.provider.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(HuginnError::RateLimited { retry_after })
        }
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(HuginnError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            })
        }
    }
}

/// Parse a JSON object out of model text, tolerating a markdown code fence.
pub(crate) fn parse_json_text(text: &str) -> Result<serde_json::Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let value: serde_json::Value = serde_json::from_str(body.trim())
        .map_err(|e| HuginnError::Format(format!("response is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(HuginnError::Format("response JSON is not an object".into()));
    }
    Ok(value)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let value = parse_json_text("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_bare_json() {
        assert!(parse_json_text("  {\"a\": 1} ").is_ok());
    }

    #[test]
    fn rejects_prose_and_arrays() {
        assert!(matches!(
            parse_json_text("Sure! Here is the analysis."),
            Err(HuginnError::Format(_))
        ));
        assert!(matches!(parse_json_text("[1, 2]"), Err(HuginnError::Format(_))));
    }
}
