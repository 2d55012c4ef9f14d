use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventx_studio::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EventX Studio API");

    // Connects, migrates, and rebuilds seat inventory from the ledger.
    let app_state = AppState::new(config.clone()).await?;
    info!("State initialized, inventory rebuilt");

    // Background sweep that releases expired reservation holds
    let cleanup = CleanupService::new(app_state.clone());
    task::spawn(cleanup.run());

    let app = Router::new()
        .route("/", get(|| async { "EventX Studio API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        // The SPA frontend is served from a different origin
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
