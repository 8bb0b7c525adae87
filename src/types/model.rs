//! Provider and model configuration types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::HuginnError;

/// Supported AI providers.
///
/// Every provider except [`Anthropic`](ProviderKind::Anthropic) speaks the
/// OpenAI-compatible chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Zhipu,
    Alibaba,
    DeepSeek,
    Moonshot,
    MiniMax,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Zhipu,
        ProviderKind::Alibaba,
        ProviderKind::DeepSeek,
        ProviderKind::Moonshot,
        ProviderKind::MiniMax,
    ];

    /// Stable lowercase name, used in fingerprints, logs and the ledger.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Zhipu => "zhipu",
            ProviderKind::Alibaba => "alibaba",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Moonshot => "moonshot",
            ProviderKind::MiniMax => "minimax",
        }
    }

    /// Default API base URL.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            ProviderKind::Alibaba => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
            ProviderKind::Moonshot => "https://api.moonshot.cn/v1",
            ProviderKind::MiniMax => "https://api.minimax.chat/v1",
        }
    }

    /// Structured-output dialect used when the config does not pick one.
    ///
    /// Moonshot, MiniMax and Alibaba handle forced function calls poorly and
    /// get JSON mode instead.
    pub fn default_mode(self) -> StructuredMode {
        match self {
            ProviderKind::Moonshot | ProviderKind::MiniMax | ProviderKind::Alibaba => {
                StructuredMode::Json
            }
            _ => StructuredMode::Tools,
        }
    }

    /// Environment variable consulted for this provider's API key.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Zhipu => "ZHIPU_API_KEY",
            ProviderKind::Alibaba => "DASHSCOPE_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::Moonshot => "MOONSHOT_API_KEY",
            ProviderKind::MiniMax => "MINIMAX_API_KEY",
        }
    }

    pub fn is_openai_compatible(self) -> bool {
        self != ProviderKind::Anthropic
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = HuginnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HuginnError::Configuration(format!("unsupported provider: {s}")))
    }
}

/// How the structured result is requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredMode {
    /// Forced function/tool call whose arguments carry the result.
    Tools,
    /// Free-form JSON object mode; the schema travels in the prompt.
    Json,
    /// Provider-enforced JSON schema (`response_format: json_schema`).
    Native,
}

/// Deterministic identity of the model that produced a result.
///
/// Derived from provider + model name only; the API key never participates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(provider: ProviderKind, model_name: &str) -> Self {
        Self(format!("{}:{}", provider.as_str(), model_name.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One provider/model configuration.
///
/// ```rust
/// # use huginn::{ModelConfig, ProviderKind, StructuredMode};
/// let config = ModelConfig::new(ProviderKind::Moonshot, "moonshot-v1-8k", "sk-test");
/// assert_eq!(config.mode(), StructuredMode::Json);
/// assert_eq!(config.fingerprint().as_str(), "moonshot:moonshot-v1-8k");
/// ```
#[derive(Clone)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model_name: String,
    pub api_key: String,
    /// Explicit dialect; `None` uses [`ProviderKind::default_mode`].
    pub mode: Option<StructuredMode>,
    /// Override for the provider's default base URL.
    pub base_url: Option<String>,
    /// Upper bound for a single attempt. Default: 30s.
    pub timeout: Duration,
    /// Completion token cap. Default: 2048.
    pub max_tokens: u32,
    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(
        provider: ProviderKind,
        model_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            api_key: api_key.into(),
            mode: None,
            base_url: None,
            timeout: Duration::from_secs(30),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    pub fn with_mode(mut self, mode: StructuredMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Effective structured-output dialect.
    pub fn mode(&self) -> StructuredMode {
        self.mode.unwrap_or_else(|| self.provider.default_mode())
    }

    /// Effective base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.provider, &self.model_name)
    }

    /// Reject configurations that cannot possibly make a call.
    pub fn validate(&self) -> crate::Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(HuginnError::Configuration(format!(
                "{}: model name is empty",
                self.provider
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(HuginnError::Configuration(format!(
                "{}: API key is empty (set {} or add it to secrets.toml)",
                self.provider,
                self.provider.api_key_env_var()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_key", &"<redacted>")
            .field("mode", &self.mode())
            .field("base_url", &self.base_url())
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
