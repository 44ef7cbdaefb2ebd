use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::analyzer::SentimentAnalyzer;
use crate::banding::BandingProfile;
use crate::sentiment::{AnalysisSource, SentimentResult};
use crate::store::{Post, PostStore};

pub struct AppState {
    pub analyzer: SentimentAnalyzer,
    pub store: Arc<dyn PostStore>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    #[schema(example = "模擬授業がとても面白かったです！")]
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: SentimentResult,
    #[schema(example = "#28a745")]
    pub color: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    #[schema(example = "たろう")]
    pub nickname: String,
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "model" when a language model is configured, else "keyword"
    pub mode: String,
    pub primary_model: Option<String>,
    pub fallback_model: Option<String>,
    pub profile: BandingProfile,
    pub store: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, analyze, create_post, list_posts, clear_posts),
    components(schemas(
        AnalyzeRequest,
        AnalyzeResponse,
        CreatePostRequest,
        HealthResponse,
        ClearResponse,
        Post,
        SentimentResult,
        AnalysisSource,
        BandingProfile
    )),
    tags((name = "feed", description = "Sentiment feed API"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/sentiment-feed-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/posts", get(list_posts).post(create_post).delete(clear_posts))
        .with_state(state)
}

/// Service mode and configuration
#[utoipa::path(get, path = "/health", tag = "feed",
    responses((status = 200, body = HealthResponse)))]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let models = state.analyzer.models();
    Json(HealthResponse {
        mode: if models.is_some() { "model" } else { "keyword" }.to_string(),
        primary_model: models.map(|m| m.primary.clone()),
        fallback_model: models.map(|m| m.secondary.clone()),
        profile: state.analyzer.profile(),
        store: state.store.kind().to_string(),
    })
}

/// Analyze a comment without storing it
#[utoipa::path(post, path = "/analyze", tag = "feed",
    request_body = AnalyzeRequest,
    responses((status = 200, body = AnalyzeResponse)))]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let result = state.analyzer.analyze(&req.text).await;
    let color = state.analyzer.profile().color_for(result.score).to_string();
    Json(AnalyzeResponse { result, color })
}

/// Analyze and store a post
#[utoipa::path(post, path = "/posts", tag = "feed",
    request_body = CreatePostRequest,
    responses(
        (status = 200, body = Post),
        (status = 400, description = "Nickname or text missing"),
        (status = 502, description = "Post store unavailable")
    ))]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<Post>, StatusCode> {
    let nickname = req.nickname.trim();
    let text = req.text.trim();
    if nickname.is_empty() || text.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let analysis = state.analyzer.analyze(text).await;
    if !analysis.is_model_backed() {
        tracing::info!("ℹ️ Post from '{}' scored with basic analysis", nickname);
    }

    let post = Post::new(nickname, text, &analysis, state.analyzer.profile());
    state.store.save(&post).await.map_err(|e| {
        tracing::error!("🔥 Failed to save post: {:#}", e);
        StatusCode::BAD_GATEWAY
    })?;

    tracing::info!("💾 Saved post {} ({} 点)", post.id, post.sentiment);
    Ok(Json(post))
}

/// Feed, newest first
#[utoipa::path(get, path = "/posts", tag = "feed",
    responses(
        (status = 200, body = Vec<Post>),
        (status = 502, description = "Post store unavailable")
    ))]
pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Post>>, StatusCode> {
    let mut posts = state.store.load().await.map_err(|e| {
        tracing::error!("🔥 Failed to load posts: {:#}", e);
        StatusCode::BAD_GATEWAY
    })?;
    posts.sort_by(|a, b| b.time.cmp(&a.time));
    Ok(Json(posts))
}

/// Remove every post
#[utoipa::path(delete, path = "/posts", tag = "feed",
    responses(
        (status = 200, body = ClearResponse),
        (status = 502, description = "Post store unavailable")
    ))]
pub async fn clear_posts(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>, StatusCode> {
    state.store.clear().await.map_err(|e| {
        tracing::error!("🔥 Failed to clear posts: {:#}", e);
        StatusCode::BAD_GATEWAY
    })?;
    tracing::info!("🧹 All posts cleared");
    Ok(Json(ClearResponse {
        success: true,
        message: "All posts cleared".to_string(),
    }))
}
