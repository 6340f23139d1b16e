//! HTTP/WebSocket API server
//!
//! Exposes the voice-to-code pipeline over an axum router: transcription
//! (upload and WebSocket), prompt translation, code generation (optionally
//! streamed), speech synthesis, scaffold generation, and session CRUD.

mod http;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::llm::LlmRouter;
use crate::prompt::PromptEngine;
use crate::session::SessionManager;
use crate::stt::{create_stt_provider, SttProvider};
use crate::tts::{create_tts_provider, TtsProvider};

/// Shared state handed to every handler.
pub struct ServerState {
    pub config: Config,
    pub stt: Arc<dyn SttProvider>,
    pub tts: Arc<dyn TtsProvider>,
    pub prompt_engine: PromptEngine,
    pub llm_router: LlmRouter,
    pub sessions: SessionManager,
}

impl ServerState {
    /// Wire up all components from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let stt: Arc<dyn SttProvider> = Arc::from(create_stt_provider(&config.stt)?);
        let tts: Arc<dyn TtsProvider> = Arc::from(create_tts_provider(&config.tts)?);

        let prompt_engine = match &config.prompt.template_dir {
            Some(dir) => PromptEngine::with_template_dir(dir)?,
            None => PromptEngine::new(),
        };

        let llm_router = LlmRouter::from_config(&config.llm);
        let sessions = SessionManager::new(config.session.max_sessions);

        Ok(Self {
            config,
            stt,
            tts,
            prompt_engine,
            llm_router,
            sessions,
        })
    }
}

/// Build the API router over shared state.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(http::root))
        .route("/health", get(http::health))
        .route("/api/transcribe", post(http::transcribe))
        .route("/ws/transcribe", get(ws::transcribe_ws))
        .route("/api/translate-prompt", post(http::translate_prompt))
        .route("/api/generate-code", post(http::generate_code))
        .route("/api/voice-to-code", post(http::voice_to_code))
        .route("/api/synthesize", post(http::synthesize))
        .route("/api/generate-scaffold", post(http::generate_scaffold))
        .route(
            "/api/sessions",
            get(http::list_sessions).post(http::create_session),
        )
        .route(
            "/api/sessions/{id}",
            get(http::get_session).delete(http::delete_session),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .context("Invalid server address")?;

    let state = Arc::new(ServerState::from_config(config)?);
    let app = build_router(state);

    info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
