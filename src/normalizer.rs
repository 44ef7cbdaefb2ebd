//! Turns raw model output into a `SentimentResult`.
//!
//! Recovery is layered:
//! - strict JSON parse of the (possibly fenced) payload
//! - regex salvage of a score from free text
//! - keyword heuristic on the original input
//!
//! `normalize` never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::banding::BandingProfile;
use crate::heuristic::score_by_keywords;
use crate::sentiment::{clamp_score, AnalysisSource, SentimentResult};

const DEFAULT_SCORE: u8 = 50;

/// Extract the JSON payload from a model response.
///
/// A ```` ```json ```` fence wins over a bare ```` ``` ```` fence, which wins
/// over the raw text. An unterminated fence yields everything after it.
/// Returns `None` when nothing but whitespace remains.
pub fn extract_payload(raw: &str) -> Option<&str> {
    let raw = raw.trim();

    let fenced = fenced_block(raw, "```json").or_else(|| fenced_block(raw, "```"));
    let payload = fenced.unwrap_or(raw).trim();

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

fn fenced_block<'a>(raw: &'a str, opener: &str) -> Option<&'a str> {
    let start = raw.find(opener)? + opener.len();
    let rest = &raw[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Strict parse: a JSON object carrying at least `score` and `emotion`.
pub fn parse_strict(raw: &str, profile: BandingProfile) -> Option<SentimentResult> {
    let payload = extract_payload(raw)?;
    let value: Value = serde_json::from_str(payload).ok()?;
    let obj = value.as_object()?;

    if !obj.contains_key("score") || !obj.contains_key("emotion") {
        return None;
    }

    let score = obj.get("score").and_then(coerce_score).unwrap_or(DEFAULT_SCORE);

    let emotion = obj
        .get("emotion")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(profile.neutral_label())
        .to_string();

    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let keywords = obj
        .get("keywords")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Some(SentimentResult {
        score,
        emotion,
        reason,
        keywords,
        source: AnalysisSource::Model,
    })
}

/// Integer, float or numeric string, clamped to 0-100.
fn coerce_score(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .map(clamp_score),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
                .map(clamp_score)
        }
        _ => None,
    }
}

struct RecoveryPatterns {
    /// Tried in order; first capture group is the score
    score: Vec<Regex>,
    /// Tried in order; whole match is the emotion guess
    emotion: Vec<Regex>,
}

static RECOVERY: Lazy<Result<RecoveryPatterns, regex::Error>> = Lazy::new(|| {
    let score = [
        r#"(?i)(?:score|スコア)["']?\s*[:：=]\s*["']?([0-9]+)"#,
        r"(?i)([0-9]{1,3})\s*(?:点|points?|pts?)",
        r"(?:^|[^0-9])([0-9]{1,3})(?:[^0-9]|$)",
    ]
    .into_iter()
    .map(Regex::new)
    .collect::<Result<Vec<_>, _>>()?;

    let emotion = [
        r"[😍😊🙂😐😞😢][^0-9\n]*",
        r"大感動|とても満足|やや不満|とても元気|ちょっと落ち込み|落ち込み|満足|不満|元気|普通",
        r#"(?i)emotion["']?\s*[:：]\s*"[^"]*""#,
    ]
    .into_iter()
    .map(Regex::new)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(RecoveryPatterns { score, emotion })
});

/// Digits captured by a score pattern. Anything too large to parse is
/// above the range anyway.
fn parse_digits(digits: &str) -> u8 {
    digits
        .parse::<i64>()
        .map(clamp_score)
        .unwrap_or(100)
}

/// Regex salvage for responses that are not valid JSON.
///
/// The emotion found in the text is only a first guess; the returned emotion
/// is always the band of the recovered score.
pub fn salvage(raw: &str, profile: BandingProfile, model_name: &str) -> Option<SentimentResult> {
    let patterns = RECOVERY.as_ref().ok()?;

    let score = patterns
        .score
        .iter()
        .find_map(|re| re.captures(raw).and_then(|c| c.get(1)))
        .map(|m| parse_digits(m.as_str()))
        .unwrap_or(DEFAULT_SCORE);

    let guessed = patterns
        .emotion
        .iter()
        .find_map(|re| re.find(raw))
        .map(|m| m.as_str().trim())
        .unwrap_or(profile.neutral_label());
    tracing::debug!("🔧 Salvaged score {} (emotion guess '{}')", score, guessed);

    Some(SentimentResult {
        score,
        emotion: profile.emotion_for(score).to_string(),
        reason: partial_reason(model_name),
        keywords: Vec::new(),
        source: AnalysisSource::Partial,
    })
}

pub fn partial_reason(model_name: &str) -> String {
    format!("Gemini {} の部分解析", model_name)
}

/// Normalize a raw model response. Falls back to keyword scoring of
/// `original_text` when neither JSON nor regex recovery applies.
pub fn normalize(
    raw: &str,
    original_text: &str,
    profile: BandingProfile,
    model_name: &str,
) -> SentimentResult {
    if let Some(result) = parse_strict(raw, profile) {
        return result;
    }
    tracing::debug!("⚠️ Model response is not a usable JSON object, trying regex recovery");

    salvage(raw, profile, model_name).unwrap_or_else(|| {
        tracing::warn!("⚠️ Regex recovery unavailable, using keyword analysis");
        score_by_keywords(original_text, profile)
    })
}
