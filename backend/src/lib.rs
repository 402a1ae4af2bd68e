//! Movie Club Server Library
//!
//! This module exposes the server components for integration testing.

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod season;
pub mod store;

use axum::{routing::get, Router};
use chrono::Utc;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use season::{ManualClock, SeasonManager, SeasonPolicy};
use store::SqliteStore;

/// Admin token accepted by [`create_test_app`].
pub const TEST_ADMIN_TOKEN: &str = "test_admin_token";

/// Creates the application router with all endpoints
pub fn create_app(state: Arc<api::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Movie Club Server" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api/scopes", api::scopes_router().with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    let pool = db::create_memory_pool()
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test helper to create a fully configured test app backed by SQLite, with
/// a manually driven clock and a fixed pick seed.
pub async fn create_test_app() -> (Router, Arc<ManualClock>) {
    let pool = create_test_db().await;
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let manager = Arc::new(SeasonManager::with_seed(
        Arc::new(SqliteStore::new(pool)),
        clock.clone(),
        SeasonPolicy::default(),
        42,
    ));

    let state = Arc::new(api::AppState {
        manager,
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
    });

    (create_app(state), clock)
}
