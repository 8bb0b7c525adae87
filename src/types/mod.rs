//! Public types for the Huginn API.

mod analysis;
mod model;
mod record;
mod response;

pub use analysis::{
    ANALYSIS_SCHEMA_VERSION, AnalysisResult, BigFive, CircadianPhase, CognitiveDistortions,
    CommitmentStrength, CommunicationStyle, Complexity, ContentFlags, CreativeSignal,
    DominantLanguage, Emotion, EmotionKind, EmotionTrigger, Entities, Humor, HumorKind, Intent,
    IntentKind, LanguageMixing, Level, MentalHealth, Novelty, Pace, Personality, ProblemStyle,
    Profanity, ProfanityTrigger, QuestionDepth, Readability, Sentiment, SentimentLabel, Severity,
    SocialFocus, SocialIndicators, SpeechPatterns, TemporalContext, ThinkingStyle, TimePerception,
    TimeUrgency, Trend, Urgency,
};
pub use model::{Fingerprint, ModelConfig, ProviderKind, StructuredMode};
pub use record::AnalyzableRecord;
pub use response::{Analyzed, RawCompletion, Usage};
