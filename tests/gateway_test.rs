//! Integration tests for the single-record provider gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use huginn::{
    AnalyzableRecord, HuginnError, MockProvider, ModelConfig, PromptTemplate, ProviderClient,
    ProviderGateway, ProviderKind, RawCompletion, RetryConfig, Usage,
};
use serde_json::json;

// ============================================================================
// Scripted client
// ============================================================================

type Script = Box<dyn Fn(usize) -> huginn::Result<RawCompletion> + Send + Sync>;

/// Answers each call with `script(call_index)` and counts calls.
struct ScriptedClient {
    calls: AtomicUsize,
    delay: Option<Duration>,
    script: Script,
}

impl ScriptedClient {
    fn new(script: impl Fn(usize) -> huginn::Result<RawCompletion> + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            script: Box::new(script),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _config: &ModelConfig, _prompt: &str) -> huginn::Result<RawCompletion> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(n)
    }
}

fn valid(usage: Option<Usage>) -> huginn::Result<RawCompletion> {
    Ok(RawCompletion {
        payload: serde_json::to_value(MockProvider::analysis_for("hello")).unwrap(),
        usage,
    })
}

fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(attempts)
        .initial_delay(Duration::from_millis(1))
        .jitter(false)
}

fn deepseek() -> ModelConfig {
    ModelConfig::new(ProviderKind::DeepSeek, "deepseek-chat", "sk-test")
}

fn gateway(client: &Arc<ScriptedClient>, retry: RetryConfig) -> ProviderGateway {
    ProviderGateway::empty()
        .with_client(ProviderKind::DeepSeek, client.clone())
        .with_retry(retry)
        .with_template(PromptTemplate::new("{content}"))
}

fn record() -> AnalyzableRecord {
    AnalyzableRecord::new("r1", "abcd")
}

// ============================================================================
// Retry classification
// ============================================================================

#[tokio::test]
async fn success_reports_usage_and_cost() {
    let client = Arc::new(ScriptedClient::new(|_| valid(Some(Usage::new(1000, 1000)))));
    let analyzed = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(analyzed.provider, ProviderKind::DeepSeek);
    assert_eq!(analyzed.model_name, "deepseek-chat");
    assert_eq!(analyzed.usage, Usage::new(1000, 1000));
    // 1000 * 2.0 / 1M + 1000 * 3.0 / 1M
    assert!((analyzed.cost - 0.005).abs() < 1e-12);
    assert_eq!(analyzed.fingerprint().as_str(), "deepseek:deepseek-chat");
}

#[tokio::test]
async fn missing_usage_is_charged_at_the_estimate() {
    let client = Arc::new(ScriptedClient::new(|_| valid(None)));
    let analyzed = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap();

    // "abcd" → 2 prompt tokens; completion side is the expected 800.
    assert_eq!(analyzed.usage, Usage::new(2, 800));
    assert!(analyzed.cost > 0.0);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let client = Arc::new(ScriptedClient::new(|_| {
        Err(HuginnError::AuthenticationFailed {
            provider: "deepseek".into(),
        })
    }));
    let err = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap_err();

    assert!(matches!(err, HuginnError::AuthenticationFailed { .. }));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn client_error_status_is_not_retried() {
    let client = Arc::new(ScriptedClient::new(|_| {
        Err(HuginnError::Api {
            status: 400,
            message: "bad request".into(),
        })
    }));
    let err = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap_err();

    assert!(matches!(err, HuginnError::Api { status: 400, .. }));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn schema_violation_is_retried_then_succeeds() {
    let client = Arc::new(ScriptedClient::new(|n| {
        if n == 0 {
            Ok(RawCompletion {
                payload: json!({"sentiment": "bad"}),
                usage: None,
            })
        } else {
            valid(Some(Usage::new(10, 10)))
        }
    }));
    let analyzed = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(analyzed.usage, Usage::new(10, 10));
}

#[tokio::test]
async fn out_of_range_score_is_a_format_error() {
    let client = Arc::new(ScriptedClient::new(|_| {
        let mut payload = serde_json::to_value(MockProvider::analysis_for("x")).unwrap();
        payload["sentiment"]["score"] = json!(3.5);
        Ok(RawCompletion {
            payload,
            usage: None,
        })
    }));
    let err = gateway(&client, RetryConfig::disabled())
        .call(&record(), &deepseek())
        .await
        .unwrap_err();

    match err {
        HuginnError::ExhaustedRetries { last, .. } => {
            assert!(matches!(*last, HuginnError::Format(_)))
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
}

#[tokio::test]
async fn persistent_transient_error_exhausts_retries() {
    let client = Arc::new(ScriptedClient::new(|_| {
        Err(HuginnError::Http("connection reset".into()))
    }));
    let err = gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap_err();

    match err {
        HuginnError::ExhaustedRetries {
            provider,
            attempts,
            last,
        } => {
            assert_eq!(provider, "deepseek");
            assert_eq!(attempts, 3);
            assert!(matches!(*last, HuginnError::Http(_)));
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
    assert_eq!(client.calls(), 3);
}

// ============================================================================
// Timing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn slow_call_times_out() {
    let client = Arc::new(ScriptedClient::new(|_| valid(None)).slow(Duration::from_secs(60)));
    let config = deepseek().with_timeout(Duration::from_secs(1));
    let err = gateway(&client, RetryConfig::disabled())
        .call(&record(), &config)
        .await
        .unwrap_err();

    match err {
        HuginnError::ExhaustedRetries { attempts, last, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last, HuginnError::Timeout(d) if d == Duration::from_secs(1)));
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_is_respected() {
    let client = Arc::new(ScriptedClient::new(|n| {
        if n == 0 {
            Err(HuginnError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            })
        } else {
            valid(None)
        }
    }));
    let start = tokio::time::Instant::now();
    gateway(&client, fast_retry(3))
        .call(&record(), &deepseek())
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert!(start.elapsed() >= Duration::from_secs(5));
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn unregistered_provider_is_an_error() {
    let client = Arc::new(ScriptedClient::new(|_| valid(None)));
    let config = ModelConfig::new(ProviderKind::Moonshot, "moonshot-v1-8k", "k");
    let err = gateway(&client, fast_retry(3))
        .call(&record(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, HuginnError::NoProvider));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn template_controls_the_prompt() {
    let gateway = ProviderGateway::empty().with_template(PromptTemplate::new("say: {content}"));
    assert_eq!(gateway.prompt_for(&record()), "say: abcd");
}
