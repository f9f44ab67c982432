pub mod api;
pub mod state;

use crate::config::Config;
use crate::llm::LlmClient;
use crate::script::StoryParser;
use crate::tts::TtsClient;
use anyhow::{Context, Result};
use api::create_router;
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Runs the HTTP API until the process is stopped.
pub async fn serve(
    config: Config,
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    parser: Arc<dyn StoryParser>,
) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, llm, tts, parser));

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
