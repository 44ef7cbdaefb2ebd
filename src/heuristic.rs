//! Keyword-based sentiment scoring.
//!
//! Lexicon lookup over Japanese feedback text. Used whenever the language
//! model is not configured or cannot be reached, so it must never fail.

use once_cell::sync::Lazy;
use std::collections::BTreeSet;

use crate::banding::BandingProfile;
use crate::sentiment::{clamp_score, AnalysisSource, SentimentResult};

pub const KEYWORD_REASON: &str = "キーワードベース分析（フォールバック）";

// Positive terms for open-campus and everyday feedback
pub static POSITIVE_TERMS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "楽しい", "嬉しい", "最高", "良い", "すごい", "がんばる", "頑張る",
        "感動", "素晴らしい", "ありがとう", "大好き", "幸せ", "やったー",
        "成功", "合格", "勝利", "達成", "完璧", "満足", "ワクワク",
        "興味深い", "面白い", "魅力的", "素敵", "かっこいい", "美しい",
        "充実", "発見", "学べる", "勉強になる", "将来", "夢", "希望",
        "入学したい", "通いたい", "憧れ", "目標", "やる気", "モチベーション",
    ]
    .into_iter()
    .collect()
});

// Negative terms
pub static NEGATIVE_TERMS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "悲しい", "辛い", "大変", "不安", "心配", "疲れた", "つまらない",
        "嫌", "困った", "ダメ", "失敗", "最悪", "むかつく", "イライラ",
        "落ち込む", "がっかり", "残念", "苦しい", "難しい", "分からない",
        "迷う", "悩む", "微妙",
    ]
    .into_iter()
    .collect()
});

/// Number of lexicon terms present in `text`. Each term counts once no
/// matter how often it repeats.
fn count_present(terms: &BTreeSet<&'static str>, text: &str) -> usize {
    terms.iter().filter(|term| text.contains(**term)).count()
}

/// Scores `text` by lexicon hits and bands the score with `profile`.
pub fn score_by_keywords(text: &str, profile: BandingProfile) -> SentimentResult {
    let positive_count = count_present(&POSITIVE_TERMS, text);
    let negative_count = count_present(&NEGATIVE_TERMS, text);

    let score = if positive_count > negative_count {
        50 + positive_count as i64 * 10
    } else if negative_count > positive_count {
        50 - negative_count as i64 * 10
    } else {
        50
    };
    let score = clamp_score(score);

    tracing::debug!(
        "🧠 Keyword analysis: {} positive, {} negative -> {}",
        positive_count,
        negative_count,
        score
    );

    SentimentResult {
        score,
        emotion: profile.emotion_for(score).to_string(),
        reason: KEYWORD_REASON.to_string(),
        keywords: Vec::new(),
        source: AnalysisSource::Keyword,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_sentiment() {
        let result = score_by_keywords(
            "今日はとても楽しい一日でした。ありがとう！",
            BandingProfile::Satisfaction,
        );
        assert!(result.score >= 70);
        assert_eq!(result.score, 70);
        assert_eq!(result.emotion, "🙂 満足");

        let mood = score_by_keywords(
            "今日はとても楽しい一日でした。ありがとう！",
            BandingProfile::GeneralMood,
        );
        assert_eq!(mood.emotion, "😊 とても元気");
    }

    #[test]
    fn test_strongly_positive_reaches_top_band() {
        let result = score_by_keywords(
            "楽しい授業で感動しました。素晴らしい先輩に憧れます。入学したい！",
            BandingProfile::Satisfaction,
        );
        assert!(result.score >= 75);
        assert_eq!(result.emotion, "😊 とても満足");
    }

    #[test]
    fn test_negative_sentiment() {
        let result = score_by_keywords("説明が難しいし不安です。疲れた。", BandingProfile::Satisfaction);
        assert_eq!(result.score, 20);
        assert_eq!(result.emotion, "😢 不満");
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let result = score_by_keywords("", BandingProfile::Satisfaction);
        assert_eq!(result.score, 50);
        assert_eq!(result.emotion, crate::banding::NEUTRAL_LABEL);
        assert_eq!(result.reason, KEYWORD_REASON);
        assert!(result.keywords.is_empty());
        assert_eq!(result.source, AnalysisSource::Keyword);
    }

    #[test]
    fn test_repeated_term_counts_once() {
        let once = score_by_keywords("楽しい", BandingProfile::Satisfaction);
        let many = score_by_keywords("楽しい楽しい楽しい楽しい", BandingProfile::Satisfaction);
        assert_eq!(once.score, 60);
        assert_eq!(once, many);
    }

    #[test]
    fn test_tie_is_neutral() {
        let result = score_by_keywords("楽しいけど疲れた", BandingProfile::Satisfaction);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn test_score_clamped_at_bounds() {
        let all_negative: String = NEGATIVE_TERMS.iter().copied().collect();
        let result = score_by_keywords(&all_negative, BandingProfile::Satisfaction);
        assert_eq!(result.score, 0);

        let all_positive: String = POSITIVE_TERMS.iter().copied().collect();
        let result = score_by_keywords(&all_positive, BandingProfile::Satisfaction);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_deterministic_and_band_consistent() {
        for text in ["", "   ", "🎉🎉", "最高！でも少し不安", "ダメだった"] {
            for profile in [
                BandingProfile::GeneralMood,
                BandingProfile::Satisfaction,
                BandingProfile::SatisfactionFine,
            ] {
                let a = score_by_keywords(text, profile);
                let b = score_by_keywords(text, profile);
                assert_eq!(a, b);
                assert_eq!(a.emotion, profile.emotion_for(a.score));
            }
        }
    }

    #[test]
    fn test_lexicons_are_disjoint() {
        assert!(POSITIVE_TERMS.is_disjoint(&NEGATIVE_TERMS));
    }
}
