//! Concurrent dispatch of records to providers.
//!
//! - [`Dispatcher`]: bounded worker pool with a fallback chain.
//! - [`BudgetBreaker`]: per-run spending ceiling checked before each call.
//! - [`CancelSignal`]: caller-supplied cancellation and deadlines.

pub mod budget;
pub mod cancel;
pub mod dispatcher;

pub use budget::{BudgetBreaker, Reservation};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use dispatcher::{
    CompletionSink, DEFAULT_CONCURRENCY, DispatchConfig, DispatchOutcome, Dispatcher,
};
