//! Sentiment scoring for a live open-campus feedback feed.
//!
//! Comments are scored by Gemini when a key is configured, with regex
//! salvage for malformed replies and a keyword heuristic as the last resort.

pub mod analyzer;
pub mod api;
pub mod banding;
pub mod config;
pub mod heuristic;
pub mod normalizer;
pub mod remote;
pub mod sentiment;
pub mod store;

pub use analyzer::{ModelPair, SentimentAnalyzer};
pub use banding::BandingProfile;
pub use heuristic::score_by_keywords;
pub use normalizer::normalize;
pub use remote::{GeminiClient, RemoteError, TextModel};
pub use sentiment::{AnalysisSource, SentimentResult};
