//! Multi-store inventory planner - Backend Server
//!
//! Serves the analysis of the nightly stock snapshot and the order ledger
//! to the operators' dashboards.

use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use chrono::Local;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockplan_backend::external::CsvSheetStore;
use stockplan_backend::models::Catalog;
use stockplan_backend::services::{load_catalog, load_snapshot, OrderLedger};
use stockplan_backend::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stockplan_server=debug,stockplan_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    config.validate()?;

    tracing::info!("Starting inventory planner server");
    tracing::info!("Environment: {}", config.environment);

    // Catalog lookups
    let catalog = match &config.catalog.path {
        Some(path) => {
            tracing::info!("Loading catalog from {}", path);
            load_catalog(&tokio::fs::read_to_string(path).await?)?
        }
        None => {
            tracing::warn!("No catalog configured; store and brand codes are shown as-is");
            Catalog::default()
        }
    };

    // Order ledger
    tokio::fs::create_dir_all(&config.ledger.dir).await?;
    let store = Arc::new(CsvSheetStore::new(&config.ledger.dir));
    let ledger = OrderLedger::new(store, config.ledger.io_timeout());
    tracing::info!("Order ledger at {}", config.ledger.dir);

    let state = AppState::new(config.clone(), catalog, ledger);

    // Analyze the configured snapshot, if any
    if let Some(path) = &config.snapshot.path {
        match load_startup_snapshot(&state, path).await {
            Ok(()) => tracing::info!("Startup snapshot {} analyzed", path),
            Err(e) => tracing::error!("Startup snapshot {} not analyzed: {}", path, e),
        }
    }

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn load_startup_snapshot(state: &AppState, path: &str) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let snapshot = load_snapshot(&bytes, &state.catalog)?;
    let run = state
        .analysis()
        .run(snapshot, Local::now().date_naive())
        .await?;
    *state.session.write().await = Some(run);
    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Multi-store Inventory Planner API v1"
}
