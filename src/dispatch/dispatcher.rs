//! Bounded fan-out of gateway calls with fallback and budget enforcement.
//!
//! ```text
//!                 ┌──────────── queue (VecDeque) ────────────┐
//!                 └──┬────────────┬──────────────────────┬───┘
//!                    ▼            ▼                      ▼
//!                worker 0     worker 1      ...     worker N-1     N = concurrency
//!                    │
//!                    │ per record: for config in [primary, fallbacks..]
//!                    │   breaker.try_reserve(estimate)? ── no ──► BudgetExceeded
//!                    │   gateway.call_prompt()  ◄── select! ── cancel signal
//!                    │   Ok  → settle(actual cost), sink.completed(), result
//!                    │   Auth / ExhaustedRetries → next config
//!                    │   other error → failure
//!                    ▼
//!             DispatchOutcome { results, failures }
//! ```
//!
//! Workers are plain futures driven by `join_all` on the caller's task, so
//! at most `concurrency` gateway calls are in flight at any time. A worker
//! hands each success to the [`CompletionSink`] before taking its next
//! record, so whatever the sink persists survives the dispatch future being
//! dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use super::budget::BudgetBreaker;
use super::cancel::CancelSignal;
use crate::providers::{ProviderGateway, pricing};
use crate::telemetry;
use crate::types::{AnalyzableRecord, Analyzed, ModelConfig};
use crate::{FailureKind, HuginnError};

/// Default number of concurrent in-flight calls.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Scheduling knobs for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum in-flight gateway calls. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// Overrides every configuration's per-call timeout when set.
    pub timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
        }
    }
}

impl DispatchConfig {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn apply(&self, config: &ModelConfig) -> ModelConfig {
        match self.timeout {
            Some(t) => config.clone().with_timeout(t),
            None => config.clone(),
        }
    }
}

/// Partition of a dispatch's input: every record id lands in exactly one map.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub results: HashMap<String, Analyzed>,
    pub failures: HashMap<String, FailureKind>,
}

/// Receives every successful call as soon as it completes.
///
/// Called from the worker that made the call, outside the cancellation
/// `select!`, so a cancelled run still reports calls that already finished.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn completed(&self, id: &str, analyzed: &Analyzed);
}

/// Discards completions.
#[async_trait]
impl CompletionSink for () {
    async fn completed(&self, _id: &str, _analyzed: &Analyzed) {}
}

/// Drives many gateway calls concurrently.
pub struct Dispatcher {
    gateway: Arc<ProviderGateway>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(gateway: Arc<ProviderGateway>, config: DispatchConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    /// Analyze `records`, trying `primary` first and then each of
    /// `fallbacks` in order for records whose previous configuration
    /// failed with an authentication error or exhausted its retries.
    ///
    /// Never fails as a whole: per-record errors end up in
    /// [`DispatchOutcome::failures`].
    pub async fn dispatch(
        &self,
        records: &[AnalyzableRecord],
        primary: &ModelConfig,
        fallbacks: &[ModelConfig],
        budget: &BudgetBreaker,
        cancel: &CancelSignal,
    ) -> DispatchOutcome {
        self.dispatch_with_sink(records, primary, fallbacks, budget, cancel, &())
            .await
    }

    /// Like [`dispatch`](Self::dispatch), handing each success to `sink`
    /// as it completes.
    #[instrument(
        skip_all,
        fields(
            records = records.len(),
            primary = %primary.fingerprint(),
            fallbacks = fallbacks.len(),
            concurrency = self.config.concurrency,
        )
    )]
    pub async fn dispatch_with_sink(
        &self,
        records: &[AnalyzableRecord],
        primary: &ModelConfig,
        fallbacks: &[ModelConfig],
        budget: &BudgetBreaker,
        cancel: &CancelSignal,
        sink: &dyn CompletionSink,
    ) -> DispatchOutcome {
        let chain: Vec<ModelConfig> = std::iter::once(primary)
            .chain(fallbacks)
            .map(|c| self.config.apply(c))
            .collect();
        let queue: Mutex<VecDeque<&AnalyzableRecord>> = Mutex::new(records.iter().collect());
        let workers = self.config.concurrency.max(1).min(records.len());

        let per_worker = join_all(
            (0..workers).map(|_| self.worker(&queue, &chain, budget, cancel, sink)),
        )
        .await;

        let mut outcome = DispatchOutcome::default();
        for (id, result) in per_worker.into_iter().flatten() {
            match result {
                Ok(analyzed) => {
                    outcome.results.insert(id, analyzed);
                }
                Err(kind) => {
                    outcome.failures.insert(id, kind);
                }
            }
        }
        // Anything left was never picked up because the run was cancelled.
        let leftover = queue.into_inner().unwrap_or_else(PoisonError::into_inner);
        for record in leftover {
            outcome.failures.insert(record.id.clone(), FailureKind::Cancelled);
        }

        debug!(
            succeeded = outcome.results.len(),
            failed = outcome.failures.len(),
            spent = budget.spent(),
            "dispatch finished"
        );
        outcome
    }

    async fn worker(
        &self,
        queue: &Mutex<VecDeque<&AnalyzableRecord>>,
        chain: &[ModelConfig],
        budget: &BudgetBreaker,
        cancel: &CancelSignal,
        sink: &dyn CompletionSink,
    ) -> Vec<(String, Result<Analyzed, FailureKind>)> {
        let mut done = Vec::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(record) = next else { break };
            let result = self.process(record, chain, budget, cancel).await;
            if let Ok(analyzed) = &result {
                sink.completed(&record.id, analyzed).await;
            }
            done.push((record.id.clone(), result));
        }
        done
    }

    async fn process(
        &self,
        record: &AnalyzableRecord,
        chain: &[ModelConfig],
        budget: &BudgetBreaker,
        cancel: &CancelSignal,
    ) -> Result<Analyzed, FailureKind> {
        let prompt = self.gateway.prompt_for(record);
        let mut last_err: Option<HuginnError> = None;

        for (position, config) in chain.iter().enumerate() {
            let estimate = pricing::estimate_cost(config, &prompt);
            let Some(reservation) = budget.try_reserve(estimate) else {
                return Err(match last_err {
                    // Already failed upstream; the refusal only blocks the fallback.
                    Some(e) => e.kind(),
                    None => {
                        metrics::counter!(telemetry::BUDGET_SKIPS_TOTAL).increment(1);
                        FailureKind::BudgetExceeded
                    }
                });
            };

            if let Some(previous) = &last_err {
                metrics::counter!(telemetry::FALLBACKS_TOTAL,
                    "provider" => config.provider.as_str(),
                )
                .increment(1);
                warn!(
                    record = %record.id,
                    fallback = %config.fingerprint(),
                    position,
                    error = %previous,
                    "falling back to next configuration"
                );
            }

            let call = self.gateway.call_prompt(&prompt, config);
            let result = tokio::select! {
                r = call => r,
                _ = cancel.cancelled() => Err(HuginnError::Cancelled),
            };

            match result {
                Ok(analyzed) => {
                    reservation.settle(analyzed.cost);
                    return Ok(analyzed);
                }
                Err(e) if e.triggers_fallback() => {
                    debug!(record = %record.id, error = %e, "configuration failed");
                    last_err = Some(e);
                }
                Err(e) => {
                    debug!(record = %record.id, error = %e, "record failed");
                    return Err(e.kind());
                }
            }
        }

        Err(last_err.map_or(FailureKind::Other, |e| e.kind()))
    }
}
