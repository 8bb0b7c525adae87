//! Configuration loading for the `huginn` binary and embedding applications.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)
//!
//! Keys missing from the secrets file fall back to the provider's
//! environment variable (`ZHIPU_API_KEY`, `OPENAI_API_KEY`, ...).
//!
//! ```toml
//! [analysis]
//! concurrency = 20
//! max_cost_per_run = 10.0
//!
//! [primary]
//! provider = "zhipu"
//! model = "glm-4-flash"
//!
//! [[fallbacks]]
//! provider = "deepseek"
//! model = "deepseek-chat"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::analyzer::{AnalyzerBuilder, DEFAULT_MAX_COST};
use crate::dispatch::DEFAULT_CONCURRENCY;
use crate::prompt::{PromptLanguage, PromptTemplate};
use crate::providers::RetryConfig;
use crate::types::{ModelConfig, ProviderKind, StructuredMode};
use crate::{HuginnError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub primary: Option<ModelSection>,
    #[serde(default)]
    pub fallbacks: Vec<ModelSection>,
}

/// Run-level knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum concurrent provider calls (default: 20).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-run spending ceiling (default: 10.0).
    #[serde(default = "default_max_cost")]
    pub max_cost_per_run: f64,
    /// Per-call timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per configuration, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub language: PromptLanguage,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_cost_per_run: default_max_cost(),
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            language: PromptLanguage::default(),
            cache_path: None,
            ledger_path: None,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_cost() -> f64 {
    DEFAULT_MAX_COST
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

/// One `[primary]` or `[[fallbacks]]` entry. Keys never live here.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub mode: Option<StructuredMode>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelSection {
    fn to_model_config(&self, api_key: String, timeout: Duration) -> ModelConfig {
        let mut config =
            ModelConfig::new(self.provider, self.model.clone(), api_key).with_timeout(timeout);
        if let Some(mode) = self.mode {
            config = config.with_mode(mode);
        }
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }
}

/// Secrets configuration (API keys), keyed by provider name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secrets {
    keys: HashMap<String, ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "no config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }

    /// Analyzer builder with every setting from this file applied.
    ///
    /// The primary configuration must have a key. Fallbacks without one are
    /// left out of the chain with a warning.
    pub fn analyzer_builder(&self, secrets: &Secrets) -> Result<AnalyzerBuilder> {
        let primary = self.primary.as_ref().ok_or(HuginnError::NoProvider)?;
        let key = secrets.api_key(primary.provider).ok_or_else(|| {
            HuginnError::Configuration(format!(
                "no API key for {} (set {} or add [{}] to secrets.toml)",
                primary.provider,
                primary.provider.api_key_env_var(),
                primary.provider
            ))
        })?;
        let timeout = self.timeout();
        let mut builder = self
            .base_builder()
            .primary(primary.to_model_config(key, timeout));

        for fallback in &self.fallbacks {
            match secrets.api_key(fallback.provider) {
                Some(key) => builder = builder.fallback(fallback.to_model_config(key, timeout)),
                None => warn!(
                    provider = %fallback.provider,
                    model = %fallback.model,
                    "no API key for fallback, skipping it"
                ),
            }
        }
        Ok(builder)
    }

    /// Builder served entirely by the mock provider; keys are not needed.
    ///
    /// The model name is replaced with `mock` so offline results are cached
    /// under their own fingerprint and never mistaken for real ones.
    pub fn offline_builder(&self) -> AnalyzerBuilder {
        let provider = self
            .primary
            .as_ref()
            .map_or(ProviderKind::OpenAi, |p| p.provider);
        self.base_builder().mock().primary(
            ModelConfig::new(provider, "mock", "offline").with_timeout(self.timeout()),
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.analysis.timeout_secs)
    }

    fn base_builder(&self) -> AnalyzerBuilder {
        let analysis = &self.analysis;
        let mut builder = AnalyzerBuilder::new()
            .concurrency(analysis.concurrency)
            .max_cost(analysis.max_cost_per_run)
            .retry(RetryConfig::new().max_attempts(analysis.max_attempts))
            .template(PromptTemplate::default().language(analysis.language));
        if let Some(path) = &analysis.cache_path {
            builder = builder.cache_path(path.clone());
        }
        if let Some(path) = &analysis.ledger_path {
            builder = builder.ledger_path(path.clone());
        }
        builder
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.huginn/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/huginn/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a specific secrets file, enforcing its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Key for a provider, falling back to its environment variable.
    pub fn api_key(&self, provider: ProviderKind) -> Option<String> {
        self.keys
            .get(provider.as_str())
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(provider.api_key_env_var()).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [primary]
            provider = "zhipu"
            model = "glm-4-flash"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.analysis.concurrency, 20);
        assert_eq!(config.analysis.max_cost_per_run, 10.0);
        assert_eq!(config.analysis.timeout_secs, 30);
        assert_eq!(config.analysis.max_attempts, 3);
        assert_eq!(config.primary.unwrap().provider, ProviderKind::Zhipu);
        assert!(config.fallbacks.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [analysis]
            concurrency = 5
            max_cost_per_run = 0.5
            timeout_secs = 10
            max_attempts = 2
            language = "zh"
            cache_path = "/tmp/cache.json"

            [primary]
            provider = "moonshot"
            model = "moonshot-v1-8k"
            mode = "tools"

            [[fallbacks]]
            provider = "deepseek"
            model = "deepseek-chat"

            [[fallbacks]]
            provider = "openai"
            model = "gpt-4o-mini"
            base_url = "http://localhost:8080/v1"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.analysis.concurrency, 5);
        assert_eq!(config.analysis.language, PromptLanguage::Zh);
        assert_eq!(
            config.analysis.cache_path,
            Some(PathBuf::from("/tmp/cache.json"))
        );
        let primary = config.primary.unwrap();
        assert_eq!(primary.mode, Some(StructuredMode::Tools));
        assert_eq!(config.fallbacks.len(), 2);
        assert_eq!(
            config.fallbacks[1].base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml = r#"
            [primary]
            provider = "acme"
            model = "x"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [zhipu]
            api_key = "zp-test-key"

            [deepseek]
            api_key = "ds-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(
            secrets.api_key(ProviderKind::Zhipu),
            Some("zp-test-key".to_string())
        );
        assert_eq!(
            secrets.api_key(ProviderKind::DeepSeek),
            Some("ds-test-key".to_string())
        );
    }

    #[test]
    fn builder_requires_primary() {
        let err = Config::default()
            .analyzer_builder(&Secrets::default())
            .err()
            .unwrap();
        assert!(matches!(err, HuginnError::NoProvider));
    }

    #[test]
    fn fallback_without_key_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            [analysis]
            cache_path = "{cache}"
            ledger_path = "{ledger}"

            [primary]
            provider = "zhipu"
            model = "glm-4-flash"

            [[fallbacks]]
            provider = "minimax"
            model = "abab6.5s-chat"
        "#,
            cache = dir.path().join("c.json").display(),
            ledger = dir.path().join("l.jsonl").display(),
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let secrets: Secrets = toml::from_str("[zhipu]\napi_key = \"k\"").unwrap();
        // Only holds if the environment does not provide a MiniMax key.
        if std::env::var(ProviderKind::MiniMax.api_key_env_var()).is_ok() {
            return;
        }
        let analyzer = config.analyzer_builder(&secrets).unwrap().build().unwrap();
        assert!(analyzer.fallbacks().is_empty());
        assert_eq!(analyzer.primary().api_key, "k");
    }

    #[test]
    fn offline_builder_uses_its_own_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
            [primary]
            provider = "zhipu"
            model = "glm-4-flash"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let analyzer = config
            .offline_builder()
            .cache_path(dir.path().join("c.json"))
            .ledger_path(dir.path().join("l.jsonl"))
            .build()
            .unwrap();
        assert_eq!(analyzer.primary().fingerprint().as_str(), "zhipu:mock");
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("config file not found"));
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[openai]\napi_key = \"sk\"\n").unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let err = Secrets::load_from_file(&path).unwrap_err().to_string();
        assert!(err.contains("insecure permissions"));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        let secrets = Secrets::load_from_file(&path).unwrap();
        assert_eq!(secrets.api_key(ProviderKind::OpenAi), Some("sk".into()));
    }
}
