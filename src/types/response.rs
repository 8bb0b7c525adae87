//! Provider response types

use serde::{Deserialize, Serialize};

use super::analysis::AnalysisResult;
use super::model::{Fingerprint, ProviderKind};

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.prompt_tokens) + u64::from(self.completion_tokens)
    }
}

/// Raw structured payload returned by a provider client, before validation.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    /// The JSON object carrying the analysis (tool arguments or message body).
    pub payload: serde_json::Value,
    /// Reported usage; `None` when the provider omitted it.
    pub usage: Option<Usage>,
}

/// A validated result together with what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Analyzed {
    pub result: AnalysisResult,
    pub provider: ProviderKind,
    pub model_name: String,
    pub usage: Usage,
    /// Cost of the successful call, from the pricing table.
    pub cost: f64,
}

impl Analyzed {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.provider, &self.model_name)
    }
}
