//! Courtroom - adversarial evidence court
//!
//! Two advocates argue a dilemma over a shared evidence record while the
//! decision-maker watches, interrupts and steers the debate in real time.

mod api;
mod config;
mod evidence;
mod llm;
mod prompts;
mod runtime;
mod scoring;
mod state_machine;
mod validator;

use api::{create_router, AppState, SharedProvider};
use config::CourtConfig;
use llm::{LoggingProvider, OpenAiProvider};
use runtime::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtroom=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    let config = CourtConfig::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!("No API key configured. Set COURT_LLM_API_KEY or OPENAI_API_KEY.");
    }

    let provider = OpenAiProvider::new(
        &config.llm_base_url,
        config.api_key.clone(),
        config.settings.models.clone(),
    )?;
    tracing::info!(
        base_url = %config.llm_base_url,
        judge = %config.settings.models.judge,
        interrupt_policy = ?config.settings.phases.interrupt,
        "Provider initialized"
    );
    let provider: SharedProvider = Arc::new(LoggingProvider::new(provider));

    let store = Arc::new(SessionStore::new(
        provider,
        config.settings.clone(),
        config.idle_timeout,
    ));
    let _reaper = store.spawn_reaper(REAP_INTERVAL);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(store))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Courtroom server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
