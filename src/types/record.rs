//! Input records.

use serde::{Deserialize, Serialize};

/// A single record to analyze.
///
/// `id` must be unique within a batch; it is the cache key. The optional
/// context fields only feed the prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzableRecord {
    pub id: String,
    #[serde(alias = "content")]
    pub text: String,
    /// Unix timestamp (seconds) of when the record was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Application the record originated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl AnalyzableRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            timestamp: None,
            app_name: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_content_alias() {
        let record: AnalyzableRecord =
            serde_json::from_str(r#"{"id": "r1", "content": "hello", "timestamp": 1700000000}"#)
                .unwrap();
        assert_eq!(record.text, "hello");
        assert_eq!(record.timestamp, Some(1_700_000_000));
        assert!(record.app_name.is_none());
    }
}
