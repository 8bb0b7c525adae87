//! Request payload rendering.
//!
//! The engine does not interpret the prompt; [`PromptTemplate`] only fills a
//! handful of slots from the record. Callers with different needs replace
//! the template text wholesale via [`PromptTemplate::new`].
//!
//! Slots: `{content}`, `{time}`, `{date}`, `{app}`.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::types::AnalyzableRecord;

/// Record text beyond this many characters is cut before rendering.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 2000;

/// Instruction appended when topic labels should be written in Chinese.
const ZH_TOPIC_INSTRUCTION: &str =
    "\nUse Chinese (中文) for all topic labels in the topics array.";

/// Default analysis prompt.
pub const DEFAULT_TEMPLATE: &str = r#"You are a professional voice transcription analyst. Analyze the following voice content and return structured JSON data.

Voice content:
{content}

Recording time: {time}
Date: {date}
App in use: {app}

Return ONLY the following JSON (no other text):

{
  "sentiment": {"score": -1.0 to 1.0, "label": "positive|neutral|negative", "confidence": 0 to 1},
  "intent": {"primary": "question|statement|command|request|expression|complaint|gratitude", "secondary": [], "urgency": "immediate|normal|low"},
  "emotion": {"primary": "joy|anger|sadness|fear|surprise|disgust|neutral", "intensity": 0 to 1, "mixed": false},
  "topics": ["topic1", "topic2"],
  "communication_style": {"directness": 0 to 1, "formality": 0 to 1, "assertiveness": 0 to 1},
  "personality": {
    "big_five": {"openness": 0 to 1, "conscientiousness": 0 to 1, "extraversion": 0 to 1, "agreeableness": 0 to 1, "neuroticism": 0 to 1},
    "thinking_style": "analytical|intuitive|creative|practical",
    "problem_style": "systematic|intuitive|collaborative|independent"
  },
  "mental_health": {"stress_level": 0 to 1, "burnout_risk": "low|medium|high", "anxiety_pattern": "improving|stable|worsening", "optimism_score": 0 to 1, "rumination_score": 0 to 1},
  "content_flags": {"has_goal": false, "has_decision": false, "has_complaint": false, "has_gratitude": false, "has_plan": false, "has_action_item": false, "is_profound": false},
  "profanity": {"has_profanity": false, "severity": null, "trigger_category": null},
  "complexity": {"overall": 0 to 1, "syntactic": 0 to 1, "lexical_diversity": 0 to 1, "readability": "simple|medium|complex|academic"},
  "entities": {"people": [], "places": [], "organizations": [], "dates": [], "numbers": []},
  "speech_patterns": {"fluency": 0 to 1, "hesitation_count": 0, "self_correction_count": 0, "repetition_count": 0, "pace": "slow|normal|fast|variable"},
  "social_indicators": {"pronoun_ratio": {"i": 0.5}, "gratitude_complaint_ratio": 0 to 1, "social_focus": "individual|collaborative|observational"},
  "cognitive_distortions": {"absolutist_language": false, "catastrophizing": false, "overgeneralization": false},
  "question_depth": null,
  "temporal_context": {"circadian_phase": "active|rest|transition", "fatigue_indicator": "low|medium|high", "energy_level": 0 to 1},
  "language_mixing": {"dominant": "zh|en|mixed", "code_switch_count": 0, "en_ratio": 0 to 1},
  "creative_signal": {"is_brainstorm": false, "idea_density": 0 to 1, "novelty": "routine|variation|breakthrough"},
  "emotion_trigger": null,
  "commitment_strength": null,
  "humor": {"detected": false, "type": null},
  "time_perception": {"urgency": "urgent|normal|relaxed", "references_past": false, "references_future": false}
}
"#;

/// Output language for free-text labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLanguage {
    #[default]
    En,
    Zh,
}

/// Renders records into provider prompts.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    language: PromptLanguage,
    max_content_chars: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            language: PromptLanguage::default(),
            max_content_chars: MAX_PROMPT_CONTENT_CHARS,
        }
    }

    pub fn language(mut self, language: PromptLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    /// Render the prompt for one record.
    pub fn render(&self, record: &AnalyzableRecord) -> String {
        let content = truncate_chars(&record.text, self.max_content_chars);
        let when = record
            .timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        let (time, date) = match when {
            Some(dt) => (dt.format("%H:%M").to_string(), dt.format("%Y-%m-%d").to_string()),
            None => ("Unknown".to_string(), "Unknown".to_string()),
        };
        let app = record
            .app_name
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or("Unknown");

        let mut prompt = self
            .template
            .replace("{time}", &time)
            .replace("{date}", &date)
            .replace("{app}", app)
            // content last, so braces inside the record text are left alone
            .replace("{content}", content);
        if self.language == PromptLanguage::Zh {
            prompt.push_str(ZH_TOPIC_INSTRUCTION);
        }
        prompt
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
