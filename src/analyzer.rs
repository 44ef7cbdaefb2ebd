//! Sentiment analyzer: model first, keyword heuristic last.
//!
//! `analyze` is total. A missing model, a slow model, an error or garbage
//! output all end in a usable `SentimentResult`.

use std::sync::Arc;
use std::time::Duration;

use crate::banding::BandingProfile;
use crate::config::{Settings, DEFAULT_GEMINI_TIMEOUT};
use crate::heuristic::score_by_keywords;
use crate::remote::{analyze_remote, probe_model, GeminiClient, RemoteError, TextModel};
use crate::sentiment::SentimentResult;

/// Which model an attempt goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary,
    Secondary,
}

/// Outcome of one model attempt
#[derive(Debug)]
pub enum Outcome {
    Success(SentimentResult),
    RateLimited,
    Failed(RemoteError),
}

impl From<Result<SentimentResult, RemoteError>> for Outcome {
    fn from(res: Result<SentimentResult, RemoteError>) -> Self {
        match res {
            Ok(result) => Outcome::Success(result),
            Err(e) if e.is_rate_limited() => Outcome::RateLimited,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// What to do after an attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Next {
    Done,
    Try(Stage),
    Heuristic,
}

/// Fallback decision table.
pub fn next_step(stage: Stage, outcome: &Outcome) -> Next {
    match (stage, outcome) {
        (_, Outcome::Success(_)) => Next::Done,
        (Stage::Primary, Outcome::RateLimited) => Next::Try(Stage::Secondary),
        (Stage::Primary, Outcome::Failed(_)) => Next::Heuristic,
        (Stage::Secondary, _) => Next::Heuristic,
    }
}

/// Primary/secondary model names
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub primary: String,
    pub secondary: String,
}

impl ModelPair {
    fn name(&self, stage: Stage) -> &str {
        match stage {
            Stage::Primary => &self.primary,
            Stage::Secondary => &self.secondary,
        }
    }
}

pub struct SentimentAnalyzer {
    model: Option<Arc<dyn TextModel>>,
    models: ModelPair,
    profile: BandingProfile,
    timeout: Duration,
    verbose: bool,
}

impl SentimentAnalyzer {
    /// Keyword-only analyzer
    pub fn keyword_only(profile: BandingProfile) -> Self {
        Self {
            model: None,
            models: ModelPair {
                primary: String::new(),
                secondary: String::new(),
            },
            profile,
            timeout: DEFAULT_GEMINI_TIMEOUT,
            verbose: false,
        }
    }

    pub fn with_model(
        model: Arc<dyn TextModel>,
        models: ModelPair,
        profile: BandingProfile,
        timeout: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            model: Some(model),
            models,
            profile,
            timeout,
            verbose,
        }
    }

    /// Analyzer for the configured environment, without contacting the
    /// model. A missing or unusable API key yields a keyword-only analyzer.
    pub fn from_settings(settings: &Settings) -> Self {
        match Self::client_from_settings(settings) {
            Some(client) => {
                tracing::info!(
                    "🤖 Gemini analysis enabled ({} → {})",
                    settings.gemini_model,
                    settings.gemini_fallback_model
                );
                Self::with_model(
                    Arc::new(client),
                    configured_pair(settings),
                    settings.profile,
                    settings.gemini_timeout,
                    settings.debug_mode,
                )
            }
            None => Self::keyword_only(settings.profile),
        }
    }

    /// Like `from_settings`, but probes the configured models first and
    /// only keeps the ones that answer.
    pub async fn connect(settings: &Settings) -> Self {
        let Some(client) = Self::client_from_settings(settings) else {
            return Self::keyword_only(settings.profile);
        };
        let client: Arc<dyn TextModel> = Arc::new(client);

        match select_models(client.as_ref(), &configured_pair(settings), settings.gemini_timeout).await {
            Some(models) => {
                tracing::info!("🤖 Gemini analysis enabled ({} → {})", models.primary, models.secondary);
                Self::with_model(client, models, settings.profile, settings.gemini_timeout, settings.debug_mode)
            }
            None => {
                tracing::warn!("⚠️ No Gemini model answered, using keyword analysis only");
                Self::keyword_only(settings.profile)
            }
        }
    }

    fn client_from_settings(settings: &Settings) -> Option<GeminiClient> {
        let Some(key) = settings.gemini_api_key.as_deref() else {
            tracing::info!("🔑 No GEMINI_API_KEY configured, using keyword analysis only");
            return None;
        };

        match GeminiClient::new(key, &settings.gemini_base_url, settings.gemini_timeout) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("⚠️ Gemini client unavailable ({}), using keyword analysis only", e);
                None
            }
        }
    }

    pub fn profile(&self) -> BandingProfile {
        self.profile
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Model names, if a model is configured.
    pub fn models(&self) -> Option<&ModelPair> {
        self.model.as_ref().map(|_| &self.models)
    }

    async fn attempt(&self, model: &dyn TextModel, stage: Stage, text: &str) -> Outcome {
        let name = self.models.name(stage);
        let call = analyze_remote(text, model, name, self.profile, self.verbose);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => res.into(),
            Err(_) => Outcome::Failed(RemoteError::Timeout(self.timeout)),
        }
    }

    /// Analyze `text`. Never fails.
    pub async fn analyze(&self, text: &str) -> SentimentResult {
        let Some(model) = self.model.as_deref() else {
            return score_by_keywords(text, self.profile);
        };

        let mut stage = Stage::Primary;
        loop {
            let outcome = self.attempt(model, stage, text).await;
            let next = next_step(stage, &outcome);
            self.log_decision(stage, &outcome, &next);

            match (next, outcome) {
                (Next::Done, Outcome::Success(result)) => return result,
                (Next::Try(s), _) => stage = s,
                _ => return score_by_keywords(text, self.profile),
            }
        }
    }

    fn log_decision(&self, stage: Stage, outcome: &Outcome, next: &Next) {
        let model = self.models.name(stage);
        match outcome {
            Outcome::Success(_) if self.verbose => {
                tracing::info!("✅ [{}] analysis succeeded", model)
            }
            Outcome::Success(_) => tracing::debug!("✅ [{}] analysis succeeded", model),
            Outcome::RateLimited => {
                tracing::warn!("🚨 [{}] rate limited, next: {:?}", model, next)
            }
            Outcome::Failed(e) => {
                tracing::warn!("❌ [{}] model call failed: {}, next: {:?}", model, e, next)
            }
        }
    }
}

fn configured_pair(settings: &Settings) -> ModelPair {
    ModelPair {
        primary: settings.gemini_model.clone(),
        secondary: settings.gemini_fallback_model.clone(),
    }
}

/// Startup model selection. The primary is kept when it answers a probe;
/// otherwise the secondary serves both roles. `None` when neither answers.
pub async fn select_models(model: &dyn TextModel, preferred: &ModelPair, timeout: Duration) -> Option<ModelPair> {
    for name in [&preferred.primary, &preferred.secondary] {
        let res = match tokio::time::timeout(timeout, probe_model(model, name)).await {
            Ok(res) => res,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        };
        match res {
            Ok(()) if name == &preferred.primary => return Some(preferred.clone()),
            Ok(()) => {
                tracing::warn!("⚠️ {} unavailable, using {}", preferred.primary, name);
                return Some(ModelPair {
                    primary: name.clone(),
                    secondary: name.clone(),
                });
            }
            Err(e) => tracing::warn!("❌ Probe of {} failed: {}", name, e),
        }
    }
    None
}
