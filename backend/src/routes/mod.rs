//! Route definitions for the inventory planner API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Snapshot loading and analysis session
        .nest("/snapshot", snapshot_routes())
        // Inventory views
        .nest("/inventory", inventory_routes())
        // Transfer plan
        .nest("/transfers", transfer_routes())
        // Purchase drafts
        .route("/purchases/drafts", get(handlers::list_purchase_drafts))
        // Order ledger
        .nest("/orders", order_routes())
}

/// Snapshot routes
fn snapshot_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::load_snapshot_handler).get(handlers::get_analysis))
        .route("/refresh", post(handlers::refresh_analysis))
}

/// Inventory view routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/cells", get(handlers::list_cells))
        .route("/kpis", get(handlers::get_kpis))
        .route("/consolidated", get(handlers::get_consolidated))
        .route("/export", post(handlers::export_inventory))
}

/// Transfer routes
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers))
        .route("/drafts", get(handlers::list_transfer_drafts))
}

/// Order ledger routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::emit_order))
        .route("/summary", get(handlers::list_order_summaries))
        .route("/state", put(handlers::update_order_states))
}
