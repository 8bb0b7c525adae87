//! Batch analysis facade.
//!
//! [`BatchAnalyzer`] reconciles the cache with the dispatcher:
//!
//! ```text
//! records ──► dedupe by id ──► cache.lookup(id, chain fingerprints)
//!                                 │ hit            │ miss / stale (warn)
//!                                 ▼                ▼
//!                              results ◄──── dispatcher.dispatch_with_sink()
//!                                 │                │ each success, as it lands
//!                                 │                ├──► ledger.append()
//!                                 │                └──► cache.put()
//!                                 ▼
//!                          AnalysisOutcome { results, summary }
//! ```
//!
//! A cached entry is served when any configuration of the current chain
//! (primary or fallback) produced it; entries from other models are stale.
//!
//! Every success is written to the ledger and the cache before its worker
//! moves on, on the blocking pool. Dropping the `analyze` future or killing
//! the process therefore loses at most the calls still in flight.
//!
//! Per-record failures never fail the call; they are reported in
//! [`RunSummary::failures`]. Cache and ledger write errors are logged and
//! the results are still returned.

mod builder;
mod summary;

pub use builder::{AnalyzerBuilder, DEFAULT_MAX_COST};
pub use summary::{AnalysisOutcome, FailureSummary, RunSummary};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheLookup, CacheStatus, ResultCache};
use crate::dispatch::{BudgetBreaker, CancelSignal, CompletionSink, Dispatcher};
use crate::ledger::{CostLedger, CostRecord};
use crate::types::{AnalyzableRecord, Analyzed, Fingerprint, ModelConfig};
use crate::{FailureKind, Result};

/// Analyzes batches of records, reusing cached results where possible.
///
/// ```rust,no_run
/// use huginn::{AnalyzableRecord, BatchAnalyzer, ModelConfig, ProviderKind};
///
/// # async fn run() -> huginn::Result<()> {
/// let analyzer = BatchAnalyzer::builder()
///     .primary(ModelConfig::new(ProviderKind::Zhipu, "glm-4-flash", "key"))
///     .fallback(ModelConfig::new(ProviderKind::DeepSeek, "deepseek-chat", "key"))
///     .max_cost(2.0)
///     .build()?;
///
/// let records = vec![AnalyzableRecord::new("r1", "Shipping the release tonight.")];
/// let outcome = analyzer.analyze(&records, false).await?;
/// println!("{}", outcome.summary);
/// # Ok(())
/// # }
/// ```
pub struct BatchAnalyzer {
    primary: ModelConfig,
    fallbacks: Vec<ModelConfig>,
    dispatcher: Dispatcher,
    cache: Arc<ResultCache>,
    ledger: Arc<CostLedger>,
    max_cost: f64,
}

impl BatchAnalyzer {
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    pub fn primary(&self) -> &ModelConfig {
        &self.primary
    }

    pub fn fallbacks(&self) -> &[ModelConfig] {
        &self.fallbacks
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Analyze `records`. With `force_refresh`, cached entries are ignored
    /// and overwritten.
    pub async fn analyze(
        &self,
        records: &[AnalyzableRecord],
        force_refresh: bool,
    ) -> Result<AnalysisOutcome> {
        self.analyze_with_cancel(records, force_refresh, &CancelSignal::never())
            .await
    }

    /// Like [`analyze`](Self::analyze), stopping new work once `cancel`
    /// fires. In-flight calls are abandoned; results obtained so far are
    /// already cached and are returned.
    #[instrument(
        skip_all,
        fields(records = records.len(), force_refresh, primary = %self.primary.fingerprint())
    )]
    pub async fn analyze_with_cancel(
        &self,
        records: &[AnalyzableRecord],
        force_refresh: bool,
        cancel: &CancelSignal,
    ) -> Result<AnalysisOutcome> {
        let run_id = Uuid::new_v4();
        let primary = self.primary.fingerprint();
        let accepted: Vec<Fingerprint> = std::iter::once(&self.primary)
            .chain(&self.fallbacks)
            .map(ModelConfig::fingerprint)
            .collect();

        let mut seen = HashSet::with_capacity(records.len());
        let mut duplicates = 0usize;
        let mut results = HashMap::with_capacity(records.len());
        let mut to_fetch = Vec::new();
        let mut stale_hits = 0usize;

        for record in records {
            if !seen.insert(record.id.as_str()) {
                duplicates += 1;
                warn!(record = %record.id, "duplicate record id, keeping the first occurrence");
                continue;
            }
            if force_refresh {
                to_fetch.push(record.clone());
                continue;
            }
            match self.cache.lookup(&record.id, &accepted) {
                CacheLookup::Hit(result) => {
                    results.insert(record.id.clone(), result);
                }
                CacheLookup::Miss => to_fetch.push(record.clone()),
                CacheLookup::Stale { stored } => {
                    stale_hits += 1;
                    warn!(
                        record = %record.id,
                        stored = %stored,
                        primary = %primary,
                        "cached result came from a model outside this run, re-analyzing"
                    );
                    to_fetch.push(record.clone());
                }
            }
        }
        let cache_hits = results.len();
        info!(
            %run_id,
            cache_hits,
            stale_hits,
            to_fetch = to_fetch.len(),
            "batch partitioned"
        );

        let budget = BudgetBreaker::new(self.max_cost);
        let checkpoint = Checkpoint {
            run_id,
            cache: Arc::clone(&self.cache),
            ledger: Arc::clone(&self.ledger),
        };
        let dispatched = if to_fetch.is_empty() {
            Default::default()
        } else {
            self.dispatcher
                .dispatch_with_sink(
                    &to_fetch,
                    &self.primary,
                    &self.fallbacks,
                    &budget,
                    cancel,
                    &checkpoint,
                )
                .await
        };

        let fetched_calls = dispatched.results.values();
        let tokens_in: u64 = fetched_calls
            .clone()
            .map(|a| u64::from(a.usage.prompt_tokens))
            .sum();
        let tokens_out: u64 = fetched_calls
            .clone()
            .map(|a| u64::from(a.usage.completion_tokens))
            .sum();
        let cost: f64 = fetched_calls.map(|a| a.cost).sum();
        let fetched = dispatched.results.len();
        for (id, analyzed) in dispatched.results {
            results.insert(id, analyzed.result);
        }

        let failures = FailureSummary {
            failures: dispatched.failures.into_iter().collect(),
        };
        let credentials_rejected = failures.count(FailureKind::Auth) > 0;
        if credentials_rejected && self.fallbacks.is_empty() {
            error!(
                provider = %self.primary.provider,
                records = failures.count(FailureKind::Auth),
                "provider rejected the credentials and no fallback is configured"
            );
        }

        let summary = RunSummary {
            run_id,
            total_records: seen.len(),
            cache_hits,
            stale_hits,
            fetched,
            duplicates_ignored: duplicates,
            tokens_in,
            tokens_out,
            cost,
            budget_limit: self.max_cost,
            credentials_rejected,
            failures,
        };
        if !summary.failures.is_empty() {
            warn!(
                failed = summary.failures.total(),
                skipped = summary.failures.skipped(),
                "some records produced no result"
            );
        }
        info!(
            %run_id,
            fetched,
            cost,
            results = results.len(),
            "batch analysis finished"
        );

        Ok(AnalysisOutcome { results, summary })
    }
}

/// Persists each success the moment its call completes: one ledger line,
/// then the cache entry.
struct Checkpoint {
    run_id: Uuid,
    cache: Arc<ResultCache>,
    ledger: Arc<CostLedger>,
}

#[async_trait]
impl CompletionSink for Checkpoint {
    async fn completed(&self, id: &str, analyzed: &Analyzed) {
        let cache = Arc::clone(&self.cache);
        let ledger = Arc::clone(&self.ledger);
        let record = CostRecord::for_call(self.run_id, analyzed);
        let id = id.to_owned();
        let result = analyzed.result.clone();
        let fingerprint = analyzed.fingerprint();

        // Runs to completion even if this future is dropped.
        let written = tokio::task::spawn_blocking(move || {
            if let Err(e) = ledger.append(std::slice::from_ref(&record)) {
                warn!(path = %ledger.path().display(), error = %e, "failed to append cost ledger");
            }
            if let Err(e) = cache.put(id, result, fingerprint) {
                warn!(path = %cache.path().display(), error = %e, "failed to persist result cache");
            }
        })
        .await;
        if let Err(e) = written {
            warn!(error = %e, "checkpoint task did not finish");
        }
    }
}
