// app.rs - Router assembly and server startup
//
// Every request is first offered to the dispatcher. What it does not own falls
// through to the plain routes (/ and /health) and finally to static files.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    handler::HandlerWithoutStateExt,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::AppConfig;
use crate::dispatch::{DispatchSettings, Dispatcher, Services};
use crate::error::ApiError;
use crate::middleware::{dispatch_middleware, ApiResponse};
use crate::session::MemorySessionStore;
use crate::{auth, handlers};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn session_store(config: &AppConfig) -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new(Duration::from_secs(config.session.idle_timeout_secs)))
}

/// Wire registry, authenticator and session store into a dispatcher
pub fn dispatcher(
    config: &AppConfig,
    sessions: Arc<MemorySessionStore>,
) -> anyhow::Result<Dispatcher> {
    let registry = handlers::registry();
    tracing::info!("Registered {} handler(s)", registry.len());

    let services = Services {
        authenticator: auth::from_config(&config.auth)?,
    };

    Ok(Dispatcher::new(
        Arc::new(registry),
        services,
        sessions,
        config.init_parameters.clone(),
        DispatchSettings::from_config(config),
    ))
}

pub fn build_router(dispatcher: Arc<Dispatcher>, config: &AppConfig) -> Router {
    let routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(dispatcher.clone());

    let mut router = match &config.server.static_dir {
        Some(dir) => {
            tracing::info!("Serving static files from {}", dir.display());
            routes.fallback_service(ServeDir::new(dir).not_found_service(not_found.into_service()))
        }
        None => routes.fallback(not_found),
    };

    router = router.layer(from_fn_with_state(dispatcher, dispatch_middleware));

    if config.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// Bind, serve until Ctrl-C, and sweep idle sessions in the background
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let sessions = session_store(config);
    let dispatcher = Arc::new(dispatcher(config, sessions.clone())?);
    let router = build_router(dispatcher, config);

    let sweeper = tokio::spawn(sweep_sessions(sessions));

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Bespin API listening on http://{}", bind_addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    };

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e));

    sweeper.abort();
    result
}

async fn sweep_sessions(sessions: Arc<MemorySessionStore>) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let purged = sessions.purge_expired().await;
        if purged > 0 {
            tracing::debug!("Purged {} expired session(s)", purged);
        }
    }
}

async fn root(State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    let actions: Vec<Value> = dispatcher
        .registry()
        .entries()
        .into_iter()
        .map(|(key, descriptor)| {
            json!({
                "path": format!("/{}", key),
                "handler": format!("{}.{}", descriptor.resource_type(), descriptor.action()),
                "login_required": descriptor.requires_authentication(),
            })
        })
        .collect();

    ApiResponse::success(json!({
        "name": "Bespin API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Path-dispatched actions with session-based login",
        "actions": actions,
    }))
}

async fn health() -> impl IntoResponse {
    ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    }))
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Not found")
}
