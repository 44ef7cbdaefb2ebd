//! Gemini client for model-backed sentiment analysis.
//!
//! One `generateContent` request per call. Retries and model fallback are the
//! analyzer's job; this module only classifies what went wrong.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::banding::BandingProfile;
use crate::normalizer::normalize;
use crate::sentiment::SentimentResult;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Why a model call did not produce text
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("rate limited by model {model}: {detail}")]
    RateLimited { model: String, detail: String },

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable response envelope: {0}")]
    Envelope(String),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("invalid credential: {0}")]
    Credential(String),
}

impl RemoteError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }
}

/// True when a status/body pair signals quota exhaustion.
pub fn looks_rate_limited(status: u16, body: &str) -> bool {
    let body = body.to_lowercase();
    status == 429 || body.contains("quota") || body.contains("resource_exhausted")
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> Result<String, RemoteError>;
}

// ============================================================================
// Gemini REST wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        if api_key.trim().is_empty() || api_key.chars().any(char::is_whitespace) {
            return Err(RemoteError::Credential("API key is empty or contains whitespace".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> Result<String, RemoteError> {
        let body = GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part { text: system }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout(self.timeout)
                } else {
                    RemoteError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            if looks_rate_limited(status.as_u16(), &text) {
                return Err(RemoteError::RateLimited {
                    model: model.to_string(),
                    detail: text,
                });
            }
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| RemoteError::Envelope(e.to_string()))?;
        envelope.text().ok_or(RemoteError::EmptyResponse)
    }
}

/// Connection check used at startup.
pub async fn probe_model(model_handle: &dyn TextModel, model: &str) -> Result<(), RemoteError> {
    model_handle.generate(model, "", "テスト接続").await.map(|_| ())
}

// ============================================================================
// Prompt
// ============================================================================

/// System instruction framing the analysis context.
pub fn system_instruction(profile: BandingProfile) -> &'static str {
    match profile {
        BandingProfile::GeneralMood => {
            "あなたは高校生の日々の気持ちを分析する専門AIです。\n\
             投稿された短い文章から、書き手の元気さ・気分を正確に判定してください。\n\
             出力は必ずJSON形式で行い、追加の説明は含めないでください。"
        }
        BandingProfile::Satisfaction | BandingProfile::SatisfactionFine => {
            "あなたはオープンキャンパスの感想分析専門AIです。\n\
             高校生の感想文を分析して、感情スコアと詳細な感情状態を正確に判定してください。\n\
             オープンキャンパス特有の要素（施設見学、模擬授業、学生との交流、進路への影響など）を重視して分析してください。\n\
             出力は必ずJSON形式で行い、追加の説明は含めないでください。"
        }
    }
}

/// Analysis prompt for `text`. The emotion rubric is generated from the
/// same bands used locally.
pub fn build_prompt(text: &str, profile: BandingProfile) -> String {
    let rubric: String = profile
        .rubric()
        .iter()
        .map(|(label, low, high)| format!("- {}: {}-{}点\n", label, low, high))
        .collect();

    format!(
        r#"以下の文章を分析してください。

【文章】
{text}

【出力形式】
以下のJSON形式のみで回答してください：
{{
    "score": [0-100の整数スコア],
    "emotion": "[感情表現]",
    "reason": "[判定理由の簡潔な説明]",
    "keywords": ["抽出されたポジティブ/ネガティブキーワード"]
}}

【スコア基準】
- 90-100: 非常にポジティブ（強い意欲、深い感動）
- 70-89: ポジティブ（満足、興味、好印象）
- 50-69: やや良好（普通に良い、まずまず）
- 30-49: 中立・混在（迷い、どちらでもない）
- 10-29: やや不満（期待外れ、不安）
- 0-9: 非常にネガティブ（強い不満、失望）

【感情表現】
{rubric}"#
    )
}

/// One model-backed analysis. The raw reply always goes through the
/// normalizer, so only transport-level problems come back as errors.
pub async fn analyze_remote(
    text: &str,
    model_handle: &dyn TextModel,
    model_name: &str,
    profile: BandingProfile,
    verbose: bool,
) -> Result<SentimentResult, RemoteError> {
    let prompt = build_prompt(text, profile);
    let raw = model_handle
        .generate(model_name, system_instruction(profile), &prompt)
        .await?;

    if verbose {
        tracing::info!("📄 [{}] raw response: {}", model_name, raw);
    } else {
        tracing::debug!("📄 [{}] raw response: {}", model_name, raw);
    }

    Ok(normalize(&raw, text, profile, model_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::AnalysisSource;
    use std::sync::Mutex;

    struct Recorder {
        reply: String,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TextModel for Recorder {
        async fn generate(&self, model: &str, _system: &str, prompt: &str) -> Result<String, RemoteError> {
            self.calls.lock().unwrap().push((model.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_prompt_embeds_text_and_rubric() {
        let prompt = build_prompt("模擬授業が面白かった", BandingProfile::SatisfactionFine);
        assert!(prompt.contains("模擬授業が面白かった"));
        assert!(prompt.contains("\"score\""));
        assert!(prompt.contains("- 😍 大感動: 90-100点"));
        assert!(prompt.contains("- 😢 不満: 0-24点"));
    }

    #[test]
    fn test_envelope_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"score\":"},{"text":" 80}"}],"role":"model"}}]}"#;
        let envelope: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.text().as_deref(), Some("{\"score\": 80}"));
    }

    #[test]
    fn test_envelope_without_text() {
        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(blocked.text().is_none());
        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(looks_rate_limited(429, ""));
        assert!(looks_rate_limited(400, "Quota exceeded for metric"));
        assert!(looks_rate_limited(503, r#"{"status": "RESOURCE_EXHAUSTED"}"#));
        assert!(!looks_rate_limited(500, "internal"));
    }

    #[test]
    fn test_client_rejects_bad_credential() {
        let err = GeminiClient::new("  ", DEFAULT_BASE_URL, Duration::from_secs(1)).err();
        assert!(matches!(err, Some(RemoteError::Credential(_))));
        let err = GeminiClient::new("abc def", DEFAULT_BASE_URL, Duration::from_secs(1)).err();
        assert!(matches!(err, Some(RemoteError::Credential(_))));
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new("key", "http://localhost:9999/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash-lite"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
    }

    #[tokio::test]
    async fn test_analyze_remote_single_call_then_normalize() {
        let model = Recorder {
            reply: "```json\n{\"score\": 85, \"emotion\": \"😊\", \"reason\": \"good\", \"keywords\": [\"fun\"]}\n```".to_string(),
            calls: Mutex::new(Vec::new()),
        };
        let result = analyze_remote("楽しかった", &model, "m1", BandingProfile::Satisfaction, false)
            .await
            .unwrap();
        assert_eq!(result.score, 85);
        assert_eq!(result.emotion, "😊");
        assert_eq!(result.source, AnalysisSource::Model);

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "m1");
        assert!(calls[0].1.contains("楽しかった"));
    }

    #[tokio::test]
    async fn test_analyze_remote_free_text_is_salvaged() {
        let model = Recorder {
            reply: "I think this is about 72 points overall".to_string(),
            calls: Mutex::new(Vec::new()),
        };
        let result = analyze_remote("x", &model, "m1", BandingProfile::Satisfaction, true)
            .await
            .unwrap();
        assert_eq!(result.score, 72);
        assert_eq!(result.source, AnalysisSource::Partial);
    }

    // ------------------------------------------------------------------
    // GeminiClient against a local HTTP server
    // ------------------------------------------------------------------

    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::Router;
    use std::sync::Arc;

    /// (path, api key header, request body)
    type Seen = Arc<Mutex<Vec<(String, Option<String>, String)>>>;

    async fn gemini_server(status: StatusCode, reply: &'static str, delay: Duration) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let log = seen.clone();
        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: String| {
            let log = log.clone();
            async move {
                let key = headers
                    .get("x-goog-api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                log.lock().unwrap().push((uri.path().to_string(), key, body));
                tokio::time::sleep(delay).await;
                (status, reply)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), seen)
    }

    async fn call(status: StatusCode, reply: &'static str) -> Result<String, RemoteError> {
        let (base, _) = gemini_server(status, reply, Duration::ZERO).await;
        let client = GeminiClient::new("test-key", &base, Duration::from_secs(5)).unwrap();
        client.generate("gemini-test", "system", "prompt").await
    }

    #[tokio::test]
    async fn test_client_request_shape_and_reply() {
        let reply = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}],"role":"model"}}]}"#;
        let (base, seen) = gemini_server(StatusCode::OK, reply, Duration::ZERO).await;
        let client = GeminiClient::new("test-key", &base, Duration::from_secs(5)).unwrap();

        let text = client.generate("gemini-test", "be brief", "こんにちは").await.unwrap();
        assert_eq!(text, "hi");

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        let (path, key, body) = &seen[0];
        assert_eq!(path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(key.as_deref(), Some("test-key"));

        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "こんにちは");
    }

    #[tokio::test]
    async fn test_client_classifies_rate_limits() {
        let err = call(StatusCode::TOO_MANY_REQUESTS, "slow down").await.unwrap_err();
        assert!(err.is_rate_limited());

        let err = call(StatusCode::FORBIDDEN, r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_client_classifies_other_failures() {
        let err = call(StatusCode::NOT_FOUND, "model not found").await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 404, .. }));

        let err = call(StatusCode::OK, "<html>proxy</html>").await.unwrap_err();
        assert!(matches!(err, RemoteError::Envelope(_)));

        let err = call(StatusCode::OK, r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let (base, _) = gemini_server(StatusCode::OK, "{}", Duration::from_secs(5)).await;
        let client = GeminiClient::new("test-key", &base, Duration::from_millis(200)).unwrap();
        let err = client.generate("gemini-test", "", "prompt").await.unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_probe_uses_short_prompt() {
        let model = Recorder {
            reply: "ok".to_string(),
            calls: Mutex::new(Vec::new()),
        };
        probe_model(&model, "gemini-test").await.unwrap();
        let calls = model.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("gemini-test".to_string(), "テスト接続".to_string())]);
    }
}
