//! The structured analysis result produced for every record.
//!
//! The schema is fixed and versioned by [`ANALYSIS_SCHEMA_VERSION`]. Closed
//! label sets are enums, so an out-of-vocabulary label fails deserialization;
//! numeric ranges are checked by [`AnalysisResult::validate`]. Either failure
//! is a format error at the gateway and is retried.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{HuginnError, Result};

/// Version of the result schema. Stored in the cache file header.
pub const ANALYSIS_SCHEMA_VERSION: &str = "1.0";

/// Complete analysis of a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    // Core
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub emotion: Emotion,
    #[serde(default)]
    pub topics: Vec<String>,

    // Style and personality
    #[serde(default)]
    pub communication_style: CommunicationStyle,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub mental_health: MentalHealth,

    // Content
    #[serde(default)]
    pub content_flags: ContentFlags,
    #[serde(default)]
    pub profanity: Profanity,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub entities: Entities,

    // Patterns
    #[serde(default)]
    pub speech_patterns: SpeechPatterns,
    #[serde(default)]
    pub social_indicators: SocialIndicators,
    #[serde(default)]
    pub cognitive_distortions: CognitiveDistortions,
    #[serde(default)]
    pub question_depth: Option<QuestionDepth>,

    #[serde(default)]
    pub temporal_context: TemporalContext,

    // Extended insights
    #[serde(default)]
    pub language_mixing: LanguageMixing,
    #[serde(default)]
    pub creative_signal: CreativeSignal,
    #[serde(default)]
    pub emotion_trigger: Option<EmotionTrigger>,
    #[serde(default)]
    pub commitment_strength: Option<CommitmentStrength>,
    #[serde(default)]
    pub humor: Humor,
    #[serde(default)]
    pub time_perception: TimePerception,
}

impl AnalysisResult {
    /// Minimal valid result; every optional section takes its default.
    pub fn new(sentiment: Sentiment, intent: Intent, emotion: Emotion) -> Self {
        Self {
            sentiment,
            intent,
            emotion,
            topics: Vec::new(),
            communication_style: CommunicationStyle::default(),
            personality: Personality::default(),
            mental_health: MentalHealth::default(),
            content_flags: ContentFlags::default(),
            profanity: Profanity::default(),
            complexity: Complexity::default(),
            entities: Entities::default(),
            speech_patterns: SpeechPatterns::default(),
            social_indicators: SocialIndicators::default(),
            cognitive_distortions: CognitiveDistortions::default(),
            question_depth: None,
            temporal_context: TemporalContext::default(),
            language_mixing: LanguageMixing::default(),
            creative_signal: CreativeSignal::default(),
            emotion_trigger: None,
            commitment_strength: None,
            humor: Humor::default(),
            time_perception: TimePerception::default(),
        }
    }

    /// JSON schema handed to providers in tool and native modes.
    pub fn json_schema() -> serde_json::Value {
        schemars::schema_for!(AnalysisResult).to_value()
    }

    /// Parse and validate a raw provider payload.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let result: AnalysisResult =
            serde_json::from_value(value).map_err(|e| HuginnError::Format(e.to_string()))?;
        result.validate()?;
        Ok(result)
    }

    /// Check numeric ranges that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        check_range("sentiment.score", self.sentiment.score, -1.0, 1.0)?;
        let unit = [
            ("sentiment.confidence", self.sentiment.confidence),
            ("emotion.intensity", self.emotion.intensity),
            ("communication_style.directness", self.communication_style.directness),
            ("communication_style.formality", self.communication_style.formality),
            ("communication_style.assertiveness", self.communication_style.assertiveness),
            ("personality.big_five.openness", self.personality.big_five.openness),
            ("personality.big_five.conscientiousness", self.personality.big_five.conscientiousness),
            ("personality.big_five.extraversion", self.personality.big_five.extraversion),
            ("personality.big_five.agreeableness", self.personality.big_five.agreeableness),
            ("personality.big_five.neuroticism", self.personality.big_five.neuroticism),
            ("mental_health.stress_level", self.mental_health.stress_level),
            ("mental_health.optimism_score", self.mental_health.optimism_score),
            ("mental_health.rumination_score", self.mental_health.rumination_score),
            ("complexity.overall", self.complexity.overall),
            ("complexity.syntactic", self.complexity.syntactic),
            ("complexity.lexical_diversity", self.complexity.lexical_diversity),
            ("speech_patterns.fluency", self.speech_patterns.fluency),
            ("temporal_context.energy_level", self.temporal_context.energy_level),
            ("language_mixing.en_ratio", self.language_mixing.en_ratio),
            ("creative_signal.idea_density", self.creative_signal.idea_density),
        ];
        for (field, value) in unit {
            check_range(field, value, 0.0, 1.0)?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(HuginnError::Format(format!(
            "{field} = {value} is outside [{min}, {max}]"
        )))
    }
}

// ============================================================================
// Core
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Sentiment {
    /// Polarity in [-1, 1].
    pub score: f64,
    pub label: SentimentLabel,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Question,
    Statement,
    Command,
    Request,
    Expression,
    Complaint,
    Gratitude,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Intent {
    pub primary: IntentKind,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmotionKind {
    Joy,
    Anger,
    Sadness,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Emotion {
    pub primary: EmotionKind,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub mixed: bool,
    #[serde(default)]
    pub transition_potential: f64,
}

fn default_intensity() -> f64 {
    0.3
}

// ============================================================================
// Style and personality
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommunicationStyle {
    pub directness: f64,
    pub formality: f64,
    pub assertiveness: f64,
}

impl Default for CommunicationStyle {
    fn default() -> Self {
        Self {
            directness: 0.5,
            formality: 0.5,
            assertiveness: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BigFive {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl Default for BigFive {
    fn default() -> Self {
        Self {
            openness: 0.5,
            conscientiousness: 0.5,
            extraversion: 0.5,
            agreeableness: 0.5,
            neuroticism: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStyle {
    #[default]
    Analytical,
    Intuitive,
    Creative,
    Practical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStyle {
    #[default]
    Systematic,
    Intuitive,
    Collaborative,
    Independent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Personality {
    pub big_five: BigFive,
    pub thinking_style: ThinkingStyle,
    pub problem_style: ProblemStyle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Worsening,
}

/// Non-diagnostic wellbeing indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MentalHealth {
    pub stress_level: f64,
    pub burnout_risk: Level,
    pub anxiety_pattern: Trend,
    pub optimism_score: f64,
    pub rumination_score: f64,
}

impl Default for MentalHealth {
    fn default() -> Self {
        Self {
            stress_level: 0.3,
            burnout_risk: Level::Low,
            anxiety_pattern: Trend::Stable,
            optimism_score: 0.6,
            rumination_score: 0.2,
        }
    }
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ContentFlags {
    pub has_goal: bool,
    pub has_decision: bool,
    pub has_complaint: bool,
    pub has_gratitude: bool,
    pub has_plan: bool,
    pub has_action_item: bool,
    pub is_profound: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProfanityTrigger {
    Frustration,
    Anger,
    Habit,
    Humor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Profanity {
    pub has_profanity: bool,
    pub severity: Option<Severity>,
    pub trigger_category: Option<ProfanityTrigger>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Readability {
    Simple,
    #[default]
    Medium,
    Complex,
    Academic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Complexity {
    pub overall: f64,
    pub syntactic: f64,
    pub lexical_diversity: f64,
    pub readability: Readability,
}

impl Default for Complexity {
    fn default() -> Self {
        Self {
            overall: 0.4,
            syntactic: 0.3,
            lexical_diversity: 0.5,
            readability: Readability::Medium,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Entities {
    pub people: Vec<String>,
    pub places: Vec<String>,
    pub organizations: Vec<String>,
    pub dates: Vec<String>,
    pub numbers: Vec<f64>,
}

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Slow,
    #[default]
    Normal,
    Fast,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpeechPatterns {
    pub fluency: f64,
    pub hesitation_count: u32,
    pub self_correction_count: u32,
    pub repetition_count: u32,
    pub pace: Pace,
}

impl Default for SpeechPatterns {
    fn default() -> Self {
        Self {
            fluency: 0.8,
            hesitation_count: 0,
            self_correction_count: 0,
            repetition_count: 0,
            pace: Pace::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SocialFocus {
    #[default]
    Individual,
    Collaborative,
    Observational,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SocialIndicators {
    pub pronoun_ratio: HashMap<String, f64>,
    pub gratitude_complaint_ratio: f64,
    pub social_focus: SocialFocus,
}

impl Default for SocialIndicators {
    fn default() -> Self {
        Self {
            pronoun_ratio: HashMap::from([("i".to_string(), 1.0)]),
            gratitude_complaint_ratio: 0.5,
            social_focus: SocialFocus::Individual,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CognitiveDistortions {
    pub absolutist_language: bool,
    pub catastrophizing: bool,
    pub overgeneralization: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QuestionDepth {
    pub is_rhetorical: bool,
    pub is_open: bool,
    pub is_complex: bool,
    pub chain_depth: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CircadianPhase {
    #[default]
    Active,
    Rest,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TemporalContext {
    pub circadian_phase: CircadianPhase,
    pub fatigue_indicator: Level,
    pub energy_level: f64,
}

impl Default for TemporalContext {
    fn default() -> Self {
        Self {
            circadian_phase: CircadianPhase::Active,
            fatigue_indicator: Level::Low,
            energy_level: 0.5,
        }
    }
}

// ============================================================================
// Extended insights
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DominantLanguage {
    #[default]
    Zh,
    En,
    Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LanguageMixing {
    pub dominant: DominantLanguage,
    pub code_switch_count: u32,
    pub en_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Novelty {
    #[default]
    Routine,
    Variation,
    Breakthrough,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CreativeSignal {
    pub is_brainstorm: bool,
    pub idea_density: f64,
    pub novelty: Novelty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmotionTrigger {
    TechnicalFrustration,
    SocialConflict,
    Achievement,
    Uncertainty,
    ExternalPressure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStrength {
    Vague,
    Intended,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HumorKind {
    SelfDeprecating,
    Observational,
    Sarcastic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Humor {
    pub detected: bool,
    #[serde(rename = "type")]
    pub kind: Option<HumorKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeUrgency {
    Urgent,
    #[default]
    Normal,
    Relaxed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TimePerception {
    pub urgency: TimeUrgency,
    pub references_past: bool,
    pub references_future: bool,
}
