//! Offline provider producing deterministic results.
//!
//! [`MockProvider`] never touches the network. The same prompt always maps
//! to the same result, so cached runs, demos and the `--mock` CLI mode are
//! reproducible. Values are derived from simple keyword checks plus a
//! content-seeded RNG.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::pricing;
use super::traits::ProviderClient;
use crate::Result;
use crate::types::{
    AnalysisResult, CircadianPhase, Emotion, EmotionKind, Intent, IntentKind, Level, ModelConfig,
    RawCompletion, Readability, Sentiment, SentimentLabel,
};

const NEGATIVE_WORDS: &[&str] = &[
    "烦", "累", "崩溃", "糟糕", "失败", "terrible", "annoying", "frustrating", "ridiculous",
    "nightmare", "waste", "so tired",
];
const POSITIVE_WORDS: &[&str] = &["好", "棒", "完成", "成功", "great", "nice", "perfect", "sounds good"];

/// Deterministic, network-free [`ProviderClient`].
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    /// The result this provider returns for `text`.
    pub fn analysis_for(text: &str) -> AnalysisResult {
        let mut rng = StdRng::seed_from_u64(fnv1a(text.as_bytes()));

        let lower = text.to_lowercase();
        let negative = NEGATIVE_WORDS.iter().any(|w| lower.contains(w));
        let positive = POSITIVE_WORDS.iter().any(|w| lower.contains(w));

        let score = if negative {
            -0.4
        } else if positive {
            0.5
        } else {
            round2(rng.random_range(-0.15..0.35))
        };
        let label = if score < -0.1 {
            SentimentLabel::Negative
        } else if score > 0.2 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Neutral
        };
        let primary_emotion = if negative {
            [EmotionKind::Anger, EmotionKind::Sadness, EmotionKind::Fear][rng.random_range(0..3)]
        } else if positive {
            EmotionKind::Joy
        } else {
            EmotionKind::Neutral
        };
        let intent = if text.contains('?') || text.contains('？') || text.contains('吗') {
            IntentKind::Question
        } else {
            IntentKind::Statement
        };

        let mut result = AnalysisResult::new(
            Sentiment {
                score,
                label,
                confidence: round2(rng.random_range(0.7..0.95)),
            },
            Intent {
                primary: intent,
                secondary: Vec::new(),
                urgency: Default::default(),
            },
            Emotion {
                primary: primary_emotion,
                intensity: round2(rng.random_range(0.2..0.8)),
                mixed: false,
                transition_potential: 0.0,
            },
        );

        let complexity = (text.chars().count() as f64 / 200.0).min(1.0);
        result.complexity.overall = round2(complexity);
        result.complexity.syntactic = round2(complexity * 0.8);
        result.complexity.readability = if complexity < 0.3 {
            Readability::Simple
        } else {
            Readability::Medium
        };
        result.mental_health.stress_level = round2(rng.random_range(0.1..0.9));
        result.mental_health.burnout_risk = Level::Low;
        result.profanity.has_profanity = negative && rng.random_bool(0.3);
        result.temporal_context.circadian_phase = CircadianPhase::Active;
        result.topics = if rng.random_bool(0.5) {
            vec!["work".into(), "tech".into()]
        } else {
            vec!["life".into()]
        };
        result
    }
}

/// 64-bit FNV-1a; fixed across toolchains, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, config: &ModelConfig, prompt: &str) -> Result<RawCompletion> {
        let result = Self::analysis_for(prompt);
        Ok(RawCompletion {
            payload: serde_json::to_value(&result)?,
            usage: Some(pricing::estimate_usage(config, prompt)),
        })
    }
}
