//! Sentiment result type shared by every analysis path.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Structured JSON returned by the language model
    Model,
    /// Score salvaged from unstructured model output
    Partial,
    /// Local keyword heuristic
    Keyword,
}

/// Result of sentiment analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SentimentResult {
    /// 0-100, higher is more positive
    #[schema(example = 85)]
    pub score: u8,
    #[schema(example = "😊 とても満足")]
    pub emotion: String,
    pub reason: String,
    pub keywords: Vec<String>,
    pub source: AnalysisSource,
}

impl SentimentResult {
    /// True when a language model produced the score.
    pub fn is_model_backed(&self) -> bool {
        self.source != AnalysisSource::Keyword
    }
}

/// Clamp any integer into the 0-100 score range.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}
