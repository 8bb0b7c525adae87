//! Provider client trait.
//!
//! Each provider family implements [`ProviderClient`], adapting its native
//! request/response shape to a raw JSON payload that the
//! [`ProviderGateway`](super::ProviderGateway) validates against the
//! analysis schema. Clients are stateless with respect to credentials: the
//! [`ModelConfig`] passed on every call carries the key, model and base URL,
//! so one client instance serves primary and fallback configurations alike.
//!
//! # Error contract
//!
//! - `AuthenticationFailed` for 401/403 — never retried
//! - `RateLimited` for 429, with the `Retry-After` hint when present
//! - `Api { status }` for other non-success statuses (5xx is transient)
//! - `Format` when the response carries no parseable structured payload

use async_trait::async_trait;

use crate::Result;
use crate::types::{ModelConfig, RawCompletion};

/// One structured-output request against one provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Send `prompt` and return the structured payload plus usage.
    async fn complete(&self, config: &ModelConfig, prompt: &str) -> Result<RawCompletion>;
}
