//! Single-record gateway: one provider, one model, bounded retries.
//!
//! ```text
//! record ──► PromptTemplate ──► ProviderClient::complete ──► schema check
//!                                   ▲      (timeout)             │
//!                                   └──── retry w/ backoff ◄─────┘ transient / format error
//! ```
//!
//! On success the gateway reports usage and the cost computed from the
//! pricing table; the dispatcher settles the budget with that figure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use super::anthropic::AnthropicClient;
use super::openai::OpenAiCompatibleClient;
use super::pricing;
use super::retry::{RetryConfig, with_retry};
use super::traits::ProviderClient;
use crate::prompt::PromptTemplate;
use crate::telemetry;
use crate::types::{AnalysisResult, AnalyzableRecord, Analyzed, ModelConfig, ProviderKind};
use crate::{HuginnError, Result};

/// Routes each call to the client registered for the config's provider.
pub struct ProviderGateway {
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    retry: RetryConfig,
    template: PromptTemplate,
}

impl Default for ProviderGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderGateway {
    /// Gateway with the built-in HTTP clients for every provider.
    pub fn new() -> Self {
        let http = super::http::default_http_client();
        let openai: Arc<dyn ProviderClient> =
            Arc::new(OpenAiCompatibleClient::with_http_client(http.clone()));
        let anthropic: Arc<dyn ProviderClient> =
            Arc::new(AnthropicClient::with_http_client(http));
        let clients = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let client = if kind.is_openai_compatible() {
                    Arc::clone(&openai)
                } else {
                    Arc::clone(&anthropic)
                };
                (kind, client)
            })
            .collect();
        Self::with_clients(clients)
    }

    /// Gateway with no clients; register them with [`with_client`](Self::with_client).
    pub fn empty() -> Self {
        Self::with_clients(HashMap::new())
    }

    fn with_clients(clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>) -> Self {
        Self {
            clients,
            retry: RetryConfig::default(),
            template: PromptTemplate::default(),
        }
    }

    /// Register (or replace) the client serving `provider`.
    pub fn with_client(mut self, provider: ProviderKind, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(provider, client);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Render the request payload for a record.
    pub fn prompt_for(&self, record: &AnalyzableRecord) -> String {
        self.template.render(record)
    }

    /// Analyze one record under one configuration.
    pub async fn call(&self, record: &AnalyzableRecord, config: &ModelConfig) -> Result<Analyzed> {
        let prompt = self.prompt_for(record);
        self.call_prompt(&prompt, config).await
    }

    /// Send an already-rendered prompt, with timeout, validation and retry.
    #[instrument(skip(self, prompt, config), fields(provider = %config.provider, model = %config.model_name))]
    pub async fn call_prompt(&self, prompt: &str, config: &ModelConfig) -> Result<Analyzed> {
        let client = self
            .clients
            .get(&config.provider)
            .ok_or(HuginnError::NoProvider)?;
        let provider = config.provider.as_str();
        let start = Instant::now();

        let (result, usage) = with_retry(&self.retry, provider, || async move {
            let outcome = match tokio::time::timeout(config.timeout, client.complete(config, prompt))
                .await
            {
                Ok(Ok(raw)) => AnalysisResult::from_json(raw.payload).map(|r| (r, raw.usage)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(HuginnError::Timeout(config.timeout)),
            };
            let status = if outcome.is_ok() { "ok" } else { "error" };
            metrics::counter!(telemetry::REQUESTS_TOTAL,
                "provider" => provider,
                "status" => status,
            )
            .increment(1);
            outcome
        })
        .await?;

        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "provider" => provider)
            .record(start.elapsed().as_secs_f64());

        let usage = usage.unwrap_or_else(|| {
            debug!("provider omitted usage, charging the estimate");
            pricing::estimate_usage(config, prompt)
        });
        let cost = pricing::cost_of(config, usage);
        record_usage(config, usage, cost);

        Ok(Analyzed {
            result,
            provider: config.provider,
            model_name: config.model_name.clone(),
            usage,
            cost,
        })
    }
}

fn record_usage(config: &ModelConfig, usage: crate::types::Usage, cost: f64) {
    let provider = config.provider.as_str();
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider,
        "direction" => "prompt",
    )
    .increment(u64::from(usage.prompt_tokens));
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider,
        "direction" => "completion",
    )
    .increment(u64::from(usage.completion_tokens));
    metrics::gauge!(telemetry::COST_TOTAL,
        "provider" => provider,
        "model" => config.model_name.clone(),
    )
    .increment(cost);
}
