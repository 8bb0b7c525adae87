//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider name (e.g. "openai", "zhipu")
//! - `model` — model name as configured
//! - `status` — outcome: "ok" or "error"
//! - `direction` — token direction: "prompt" or "completion"

/// Total provider calls issued by the gateway (one per attempt).
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Provider call duration in seconds, including retries.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "huginn_tokens_total";

/// Accumulated spend, in the pricing table's currency unit. A gauge, since
/// costs are fractional.
///
/// Labels: `provider`, `model`.
pub const COST_TOTAL: &str = "huginn_cost_total";

/// Cache lookups that returned a result with a matching fingerprint.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Cache lookups with no stored entry.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Cache lookups that found an entry produced by a different model.
pub const CACHE_STALE_TOTAL: &str = "huginn_cache_stale_total";

/// Records skipped because the budget breaker refused them.
pub const BUDGET_SKIPS_TOTAL: &str = "huginn_budget_skips_total";

/// Records re-dispatched to a fallback configuration.
///
/// Labels: `provider` (the fallback being tried).
pub const FALLBACKS_TOTAL: &str = "huginn_fallbacks_total";
