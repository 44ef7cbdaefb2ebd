//! Score banding profiles.
//!
//! A banding profile maps a 0-100 score to an emotion label and a display
//! color. Callers pick the profile that matches their context: daily mood
//! posts use `GeneralMood`, open-campus feedback uses one of the
//! satisfaction profiles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Label shared by the middle band of every profile.
pub const NEUTRAL_LABEL: &str = "😐 普通";

const GENERAL_MOOD_BANDS: &[(u8, &str)] = &[
    (70, "😊 とても元気"),
    (60, "🙂 元気"),
    (40, NEUTRAL_LABEL),
    (30, "😞 ちょっと落ち込み"),
    (0, "😢 落ち込み"),
];

const SATISFACTION_BANDS: &[(u8, &str)] = &[
    (75, "😊 とても満足"),
    (60, "🙂 満足"),
    (40, NEUTRAL_LABEL),
    (25, "😞 やや不満"),
    (0, "😢 不満"),
];

const SATISFACTION_FINE_BANDS: &[(u8, &str)] = &[
    (90, "😍 大感動"),
    (75, "😊 とても満足"),
    (60, "🙂 満足"),
    (45, NEUTRAL_LABEL),
    (25, "😞 やや不満"),
    (0, "😢 不満"),
];

const COLORS: [&str; 5] = ["#28a745", "#17a2b8", "#6c757d", "#fd7e14", "#dc3545"];

/// Named banding profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BandingProfile {
    /// Five bands for everyday mood ("genki" scale)
    GeneralMood,
    /// Five bands for open-campus satisfaction
    #[default]
    Satisfaction,
    /// Satisfaction with an extra "deeply moved" band on top
    SatisfactionFine,
}

impl BandingProfile {
    /// Parse a profile name as it appears in configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "general_mood" | "general" | "mood" => Some(Self::GeneralMood),
            "satisfaction" | "opencampus" => Some(Self::Satisfaction),
            "satisfaction_fine" | "fine" => Some(Self::SatisfactionFine),
            _ => None,
        }
    }

    /// Ordered `(lower bound, label)` pairs, highest band first.
    pub fn bands(&self) -> &'static [(u8, &'static str)] {
        match self {
            Self::GeneralMood => GENERAL_MOOD_BANDS,
            Self::Satisfaction => SATISFACTION_BANDS,
            Self::SatisfactionFine => SATISFACTION_FINE_BANDS,
        }
    }

    pub fn emotion_for(&self, score: u8) -> &'static str {
        self.bands()
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, label)| *label)
            .unwrap_or(NEUTRAL_LABEL)
    }

    pub fn neutral_label(&self) -> &'static str {
        NEUTRAL_LABEL
    }

    /// Display color for a score.
    ///
    /// The fine profile shares the satisfaction color table; its extra top
    /// band is drawn in the same green as "very satisfied".
    pub fn color_for(&self, score: u8) -> &'static str {
        let thresholds: [u8; 4] = match self {
            Self::GeneralMood => [70, 60, 40, 30],
            Self::Satisfaction | Self::SatisfactionFine => [75, 60, 40, 25],
        };
        let idx = thresholds
            .iter()
            .position(|t| score >= *t)
            .unwrap_or(thresholds.len());
        COLORS[idx]
    }

    /// Human-readable score range for each band, used in model prompts.
    /// Returns `(label, low, high)` triples, highest band first.
    pub fn rubric(&self) -> Vec<(&'static str, u8, u8)> {
        let bands = self.bands();
        bands
            .iter()
            .enumerate()
            .map(|(i, (floor, label))| {
                let ceiling = if i == 0 { 100 } else { bands[i - 1].0 - 1 };
                (*label, *floor, ceiling)
            })
            .collect()
    }
}
