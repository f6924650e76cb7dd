mod backend_client;
mod config;
mod errors;
mod inspection;
mod models;
mod prompts;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::session::{FileSessionStore, MemorySessionStore, Session};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparseable values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting admin dashboard v{}", env!("CARGO_PKG_VERSION"));

    // Session shared by every backend call; on disk unless SESSION_FILE is empty
    let session = match &config.session_file {
        Some(path) => {
            info!("Session store: {}", path.display());
            Session::new(Arc::new(FileSessionStore::new(path)))
        }
        None => {
            info!("Session store: in memory");
            Session::new(Arc::new(MemorySessionStore::default()))
        }
    };
    info!("Signed in: {}", session.is_authenticated(chrono::Utc::now()));

    let state = AppState::new(config.clone(), session)?;
    info!(
        "Backend: {} (options policy: {})",
        config.api_base_url,
        config.options_policy.as_str()
    );
    info!("Upload limit: {} MB", config.max_upload_mb);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
