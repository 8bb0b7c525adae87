//! Builder for configuring analyzer instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::BatchAnalyzer;
use crate::cache::{ResultCache, default_cache_path};
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::ledger::{CostLedger, default_ledger_path};
use crate::prompt::PromptTemplate;
use crate::providers::{MockProvider, ProviderClient, ProviderGateway, RetryConfig};
use crate::types::{ModelConfig, ProviderKind};
use crate::{HuginnError, Result};

/// Default per-run spending ceiling.
pub const DEFAULT_MAX_COST: f64 = 10.0;

/// Builder for [`BatchAnalyzer`].
pub struct AnalyzerBuilder {
    primary: Option<ModelConfig>,
    fallbacks: Vec<ModelConfig>,
    dispatch: DispatchConfig,
    max_cost: f64,
    retry: Option<RetryConfig>,
    template: Option<PromptTemplate>,
    cache_path: Option<PathBuf>,
    ledger_path: Option<PathBuf>,
    gateway: Option<ProviderGateway>,
    clients: Vec<(ProviderKind, Arc<dyn ProviderClient>)>,
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            primary: None,
            fallbacks: Vec::new(),
            dispatch: DispatchConfig::default(),
            max_cost: DEFAULT_MAX_COST,
            retry: None,
            template: None,
            cache_path: None,
            ledger_path: None,
            gateway: None,
            clients: Vec::new(),
        }
    }

    /// Configuration every record is tried with first. Required.
    pub fn primary(mut self, config: ModelConfig) -> Self {
        self.primary = Some(config);
        self
    }

    /// Append a configuration to the fallback chain.
    pub fn fallback(mut self, config: ModelConfig) -> Self {
        self.fallbacks.push(config);
        self
    }

    pub fn fallbacks(mut self, configs: impl IntoIterator<Item = ModelConfig>) -> Self {
        self.fallbacks.extend(configs);
        self
    }

    /// Maximum concurrent provider calls (default: 20).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.dispatch.concurrency = n;
        self
    }

    /// Per-call timeout applied to every configuration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.timeout = Some(timeout);
        self
    }

    /// Per-run spending ceiling (default: 10.0).
    pub fn max_cost(mut self, limit: f64) -> Self {
        self.max_cost = limit;
        self
    }

    pub fn unlimited_budget(mut self) -> Self {
        self.max_cost = f64::INFINITY;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Cache file location (default: [`default_cache_path`]).
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Ledger file location (default: [`default_ledger_path`]).
    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    /// Start from a pre-built gateway instead of the built-in HTTP clients.
    pub fn gateway(mut self, gateway: ProviderGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Serve `provider` with a custom client.
    pub fn client(mut self, provider: ProviderKind, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.push((provider, client));
        self
    }

    /// Serve every provider with [`MockProvider`]; no network access.
    pub fn mock(mut self) -> Self {
        let mock: Arc<dyn ProviderClient> = Arc::new(MockProvider::new());
        for kind in ProviderKind::ALL {
            self.clients.push((kind, Arc::clone(&mock)));
        }
        self
    }

    /// Validate the configuration and open the cache.
    ///
    /// Fails with [`HuginnError::NoProvider`] when no primary configuration
    /// was given.
    pub fn build(self) -> Result<BatchAnalyzer> {
        let primary = self.primary.ok_or(HuginnError::NoProvider)?;
        primary.validate()?;
        for fallback in &self.fallbacks {
            fallback.validate()?;
        }
        if self.max_cost.is_nan() || self.max_cost < 0.0 {
            return Err(HuginnError::Configuration(format!(
                "max_cost must be non-negative, got {}",
                self.max_cost
            )));
        }

        let mut gateway = self.gateway.unwrap_or_default();
        for (kind, client) in self.clients {
            gateway = gateway.with_client(kind, client);
        }
        if let Some(retry) = self.retry {
            gateway = gateway.with_retry(retry);
        }
        if let Some(template) = self.template {
            gateway = gateway.with_template(template);
        }

        let cache = Arc::new(ResultCache::open(
            self.cache_path.unwrap_or_else(default_cache_path),
        ));
        let ledger = Arc::new(CostLedger::new(
            self.ledger_path.unwrap_or_else(default_ledger_path),
        ));

        Ok(BatchAnalyzer {
            primary,
            fallbacks: self.fallbacks,
            dispatcher: Dispatcher::new(Arc::new(gateway), self.dispatch),
            cache,
            ledger,
            max_cost: self.max_cost,
        })
    }
}
