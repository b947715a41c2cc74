//! Chatdesk API server

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::HeaderValue, middleware};
use chatdesk_api::{
    auth::{Argon2HashProvider, HashProvider},
    bootstrap,
    config::LogFormat,
    create_router,
    security::security_headers_middleware,
    AppState, Config,
};
use chatdesk_shared::{create_pool, run_migrations, MemoryStore, PgStore, Store};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    info!(bind_address = %config.bind_address, app_name = %config.app_name, "=== Chatdesk API Starting ===");

    let store = build_store(&config).await?;
    let hasher: Arc<dyn HashProvider> = Arc::new(Argon2HashProvider);

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap::ensure_admin(store.as_ref(), hasher.as_ref(), admin)
            .await
            .context("Failed to bootstrap admin user")?;
    }

    let cors = cors_layer(&config.cors_allowed_origins);
    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, store, hasher);

    let app = create_router(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chatdesk_api=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, using in-process store (data is lost on restart)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    info!("Connecting to database...");
    let pool = create_pool(database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    if config.run_migrations {
        info!("Applying database migrations...");
        run_migrations(&pool)
            .await
            .context("Failed to apply database migrations")?;
        info!("Database migrations applied successfully");
    }

    Ok(Arc::new(PgStore::new(pool)))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, initiating graceful shutdown..."),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown..."),
    }
}
