use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use sentiment_feed::api::{self, AppState};
use sentiment_feed::config::Settings;
use sentiment_feed::store::{MemoryStore, PostStore, SheetStore};
use sentiment_feed::SentimentAnalyzer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let settings = Settings::from_env();

    let store: Arc<dyn PostStore> = match settings.gas_url.as_deref() {
        Some(url) => {
            tracing::info!("📡 Using spreadsheet post store");
            Arc::new(SheetStore::new(url, settings.store_timeout)?)
        }
        None => {
            tracing::info!("🗒️ GAS_URL not set, posts are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState {
        analyzer: SentimentAnalyzer::connect(&settings).await,
        store,
    });

    let app = api::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
