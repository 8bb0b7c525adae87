//! Provider clients and the single-record gateway.
//!
//! [`ProviderClient`] is the seam between the engine and a vendor API. The
//! built-in HTTP clients cover every [`ProviderKind`](crate::types::ProviderKind):
//! Anthropic speaks its Messages API, everyone else the OpenAI-compatible
//! chat completions API. [`ProviderGateway`] wraps a client with the prompt
//! template, timeout, schema validation, retry and cost accounting.

pub mod anthropic;
pub mod gateway;
pub(crate) mod http;
pub mod mock;
pub mod openai;
pub mod pricing;
pub mod retry;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use gateway::ProviderGateway;
pub use mock::MockProvider;
pub use openai::OpenAiCompatibleClient;
pub use retry::RetryConfig;
pub use traits::ProviderClient;
