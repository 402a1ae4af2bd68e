use movie_club_server::{
    api,
    config::{Config, StoreBackend},
    create_app, db,
    season::SeasonManager,
    store::{MemoryStore, SeasonStore, SqliteStore},
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config = Config::from_env();
    tracing::info!("Starting movie club server on {}", config.server_addr());

    // Open the season store
    let store: Arc<dyn SeasonStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            let pool = db::create_pool(&config.database_url).await?;
            tracing::info!("Database connected");
            db::run_migrations(&pool).await?;
            Arc::new(SqliteStore::new(pool))
        }
        StoreBackend::Memory => match &config.snapshot_path {
            Some(path) => {
                tracing::info!("Using in-memory store with snapshot file {}", path);
                Arc::new(MemoryStore::open(path).await?)
            }
            None => {
                tracing::warn!("Using in-memory store without a snapshot; state is lost on exit");
                Arc::new(MemoryStore::new())
            }
        },
    };

    let manager = Arc::new(SeasonManager::with_system_clock(store, config.season_policy()));

    let state = Arc::new(api::AppState {
        manager: manager.clone(),
        admin_token: config.admin_token.clone(),
    });

    // Build router using lib function
    let app = create_app(state);

    // Spawn background task for scheduled picks
    if let Some(secs) = config.pick_interval_secs {
        let manager_picks = manager.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(secs));
            // First tick fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                match manager_picks.pick_all_scopes().await {
                    Ok(picked) => tracing::info!("Scheduled picks done for {} scopes", picked.len()),
                    Err(e) => tracing::error!("Error running scheduled picks: {:?}", e),
                }
            }
        });
        tracing::info!("Scheduled picks every {} seconds", secs);
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("Server listening on {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
