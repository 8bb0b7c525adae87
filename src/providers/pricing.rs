//! Per-token rate table and cost estimation.
//!
//! Rates are quoted per million tokens (CNY), split into prompt and
//! completion. Lookup order: exact model name, then the provider-level
//! default, then [`Rate::UNKNOWN`].
//!
//! The budget breaker needs a cost *before* the call is made, so this module
//! also provides a length-based token estimate. The estimate is deliberately
//! rough: the breaker only needs to stop scheduling in time, and the actual
//! reported cost replaces the estimate once the call completes.

use crate::types::{ModelConfig, ProviderKind, Usage};

/// Expected completion size for a full structured result.
pub const EXPECTED_COMPLETION_TOKENS: u32 = 800;

/// Characters per prompt token assumed by [`estimate_usage`].
///
/// One token per two characters sits between CJK text (about one token per
/// character) and English prose (about four characters per token).
const CHARS_PER_TOKEN: usize = 2;

/// Price of a million prompt and completion tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub prompt_per_mtok: f64,
    pub completion_per_mtok: f64,
}

impl Rate {
    /// Used when neither the model nor the provider is listed.
    pub const UNKNOWN: Rate = Rate::new(1.0, 1.0);

    pub const fn new(prompt_per_mtok: f64, completion_per_mtok: f64) -> Self {
        Self {
            prompt_per_mtok,
            completion_per_mtok,
        }
    }

    /// Cost of the given usage at this rate.
    pub fn cost(&self, usage: Usage) -> f64 {
        f64::from(usage.prompt_tokens) * self.prompt_per_mtok / 1_000_000.0
            + f64::from(usage.completion_tokens) * self.completion_per_mtok / 1_000_000.0
    }
}

/// Model-specific rates. Input rates are cache-miss prices.
const MODEL_RATES: &[(&str, Rate)] = &[
    // DeepSeek
    ("deepseek-chat", Rate::new(2.0, 3.0)),
    ("deepseek-v3", Rate::new(2.0, 3.0)),
    ("deepseek-reasoner", Rate::new(2.0, 3.0)),
    ("deepseek-r1", Rate::new(2.0, 3.0)),
    // Zhipu
    ("glm-4-flash", Rate::new(0.0, 0.0)),
    ("glm-4-flash-250414", Rate::new(0.0, 0.0)),
    ("glm-4-air", Rate::new(0.5, 0.5)),
    ("glm-4-airx", Rate::new(10.0, 10.0)),
    ("glm-4-long", Rate::new(1.0, 1.0)),
    ("glm-4-plus", Rate::new(5.0, 5.0)),
    ("glm-4", Rate::new(50.0, 50.0)),
    ("glm-4.6", Rate::new(2.0, 8.0)),
    ("glm-4.7", Rate::new(4.0, 16.0)),
    // OpenAI
    ("gpt-4o", Rate::new(18.0, 72.0)),
    ("gpt-4o-mini", Rate::new(1.1, 4.3)),
    ("gpt-4.1", Rate::new(14.4, 57.6)),
    ("gpt-4.1-mini", Rate::new(2.9, 11.5)),
    ("gpt-4.1-nano", Rate::new(0.7, 2.9)),
    ("o3", Rate::new(14.4, 57.6)),
    ("o3-mini", Rate::new(7.9, 31.7)),
    ("o4-mini", Rate::new(7.9, 31.7)),
    // Anthropic
    ("claude-3-5-sonnet-20241022", Rate::new(21.6, 108.0)),
    ("claude-3-5-haiku-20241022", Rate::new(5.8, 28.8)),
    ("claude-sonnet-4-6", Rate::new(21.6, 108.0)),
    ("claude-haiku-4-5-20251001", Rate::new(7.2, 36.0)),
    ("claude-opus-4-6", Rate::new(108.0, 540.0)),
    // Moonshot
    ("moonshot-v1-8k", Rate::new(1.4, 14.4)),
    ("moonshot-v1-32k", Rate::new(7.2, 21.6)),
    ("moonshot-v1-128k", Rate::new(14.4, 36.0)),
    // Alibaba
    ("qwen-turbo", Rate::new(0.3, 0.6)),
    ("qwen-plus", Rate::new(0.8, 2.0)),
    ("qwen-max", Rate::new(40.0, 120.0)),
    // MiniMax
    ("abab6.5s-chat", Rate::new(1.0, 1.0)),
    ("abab6.5-chat", Rate::new(1.0, 1.0)),
];

fn provider_rate(provider: ProviderKind) -> Rate {
    match provider {
        ProviderKind::Zhipu => Rate::new(0.5, 2.0),
        ProviderKind::DeepSeek => Rate::new(2.0, 3.0),
        ProviderKind::OpenAi => Rate::new(18.0, 72.0),
        ProviderKind::Anthropic => Rate::new(21.6, 108.0),
        ProviderKind::Moonshot => Rate::new(7.2, 21.6),
        ProviderKind::Alibaba => Rate::new(1.0, 3.0),
        ProviderKind::MiniMax => Rate::new(1.0, 1.0),
    }
}

/// Rate for a provider/model pair.
pub fn rate_for(provider: ProviderKind, model_name: &str) -> Rate {
    MODEL_RATES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(model_name))
        .map(|(_, rate)| *rate)
        .unwrap_or_else(|| provider_rate(provider))
}

/// Actual cost of a completed call.
pub fn cost_of(config: &ModelConfig, usage: Usage) -> f64 {
    rate_for(config.provider, &config.model_name).cost(usage)
}

/// Length-based usage estimate for a prompt that has not been sent yet.
pub fn estimate_usage(config: &ModelConfig, prompt: &str) -> Usage {
    let chars = prompt.chars().count();
    let prompt_tokens = chars.div_ceil(CHARS_PER_TOKEN);
    Usage::new(
        u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
        config.max_tokens.min(EXPECTED_COMPLETION_TOKENS),
    )
}

/// Projected cost of sending `prompt` under `config`.
pub fn estimate_cost(config: &ModelConfig, prompt: &str) -> f64 {
    cost_of(config, estimate_usage(config, prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_rate_takes_precedence_over_provider() {
        assert_eq!(rate_for(ProviderKind::Zhipu, "glm-4-flash"), Rate::new(0.0, 0.0));
        assert_eq!(rate_for(ProviderKind::Zhipu, "glm-5-unknown"), Rate::new(0.5, 2.0));
    }

    #[test]
    fn cost_is_per_million_tokens() {
        let rate = Rate::new(2.0, 3.0);
        let cost = rate.cost(Usage::new(1_000_000, 500_000));
        assert!((cost - 3.5).abs() < 1e-9);
    }

    #[test]
    fn estimate_counts_chars_not_bytes() {
        let config = ModelConfig::new(ProviderKind::DeepSeek, "deepseek-chat", "k");
        // 4 CJK characters are 12 bytes but 2 estimated tokens.
        let usage = estimate_usage(&config, "你好世界");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, EXPECTED_COMPLETION_TOKENS);
    }

    #[test]
    fn estimate_respects_small_max_tokens() {
        let config =
            ModelConfig::new(ProviderKind::DeepSeek, "deepseek-chat", "k").with_max_tokens(100);
        assert_eq!(estimate_usage(&config, "abc").completion_tokens, 100);
    }

    #[test]
    fn free_model_estimates_zero() {
        let config = ModelConfig::new(ProviderKind::Zhipu, "glm-4-flash", "k");
        assert_eq!(estimate_cost(&config, &"x".repeat(10_000)), 0.0);
    }
}
