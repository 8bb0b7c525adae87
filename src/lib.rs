//! Huginn - AI batch analysis engine
//!
//! Sends each input record once to an AI provider for structured analysis
//! and keeps the result in a durable cache, so regenerating a report costs
//! nothing and produces the same output. Many calls run concurrently under
//! a retry policy, a provider fallback chain and a hard per-run spending
//! ceiling. Cached results are only reused when the same provider/model
//! produced them.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{AnalyzableRecord, BatchAnalyzer, ModelConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let analyzer = BatchAnalyzer::builder()
//!         .primary(ModelConfig::new(ProviderKind::OpenAi, "gpt-4o-mini", "sk-..."))
//!         .concurrency(10)
//!         .max_cost(1.0)
//!         .build()?;
//!
//!     let records = vec![
//!         AnalyzableRecord::new("a", "Finally fixed the flaky test."),
//!         AnalyzableRecord::new("b", "Why is the build so slow again?"),
//!     ];
//!     let outcome = analyzer.analyze(&records, false).await?;
//!
//!     for (id, result) in &outcome.results {
//!         println!("{id}: {:?}", result.sentiment.label);
//!     }
//!     println!("{}", outcome.summary);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod prompt;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use analyzer::{AnalysisOutcome, AnalyzerBuilder, BatchAnalyzer, FailureSummary, RunSummary};
pub use cache::{CacheEntry, CacheLookup, CacheStatus, ResultCache};
pub use config::{Config, Secrets};
pub use dispatch::{
    BudgetBreaker, CancelHandle, CancelSignal, CompletionSink, DispatchConfig, DispatchOutcome,
    Dispatcher, cancel_pair,
};
pub use error::{FailureKind, HuginnError, Result};
pub use ledger::{CostLedger, CostRecord, LedgerTotal};
pub use prompt::{PromptLanguage, PromptTemplate};
pub use providers::{
    AnthropicClient, MockProvider, OpenAiCompatibleClient, ProviderClient, ProviderGateway,
    RetryConfig,
};

pub use types::{
    AnalysisResult, AnalyzableRecord, Analyzed, Fingerprint, ModelConfig, ProviderKind,
    RawCompletion, StructuredMode, Usage,
};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
