//! Quizz-it Back binary entrypoint wiring REST, SSE, the session sweeper and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use quizzit_back::{
    config::AppConfig,
    dao::session_store::memory::MemoryStore,
    routes,
    services::sweeper,
    state::{AppState, SharedState, storage::StorageHandle},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the storage backend (`memory` or `mongo`).
const STORAGE_ENV: &str = "STORAGE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = env::var(STORAGE_ENV).unwrap_or_else(|_| "memory".into());
    let app_state = match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => AppState::with_storage(config.clone(), memory_storage(&config)),
        "mongo" | "mongodb" => start_mongo(config)?,
        other => bail!("unknown {STORAGE_ENV} backend `{other}` (expected `memory` or `mongo`)"),
    };

    tokio::spawn(sweeper::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, storage = %backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// In-memory backend seeded from the question bank file; empty when the file cannot be read.
fn memory_storage(config: &AppConfig) -> Arc<StorageHandle> {
    let path = &config.question_bank_path;
    let store = match MemoryStore::from_json_file(path) {
        Ok(store) => {
            info!(path = %path.display(), "question bank loaded");
            store
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "question bank unavailable; starting empty");
            MemoryStore::new()
        }
    };
    Arc::new(StorageHandle::with_store(Arc::new(store)))
}

#[cfg(feature = "mongo-store")]
/// Start degraded and let the supervisor connect to MongoDB in the background.
fn start_mongo(config: AppConfig) -> anyhow::Result<SharedState> {
    use quizzit_back::{
        dao::{
            session_store::{
                SessionStore,
                mongodb::{MongoConfig, MongoSessionStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let storage = Arc::new(StorageHandle::new());
    tokio::spawn(storage_supervisor::run(storage.clone(), || async {
        let mongo_config = MongoConfig::from_env().await?;
        let store = MongoSessionStore::connect(mongo_config).await?;
        Ok::<Arc<dyn SessionStore>, StorageError>(Arc::new(store))
    }));
    Ok(AppState::with_storage(config, storage))
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo(_config: AppConfig) -> anyhow::Result<SharedState> {
    bail!("this build does not include MongoDB support (enable the `mongo-store` feature)")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
