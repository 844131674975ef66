//! Streamable HTTP transport: `/health` in the clear, the MCP service behind bearer auth.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use puddle_core::config::ServerConfig;
use puddle_db::DbPool;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::auth::{require_bearer, AuthManager};
use crate::server::PuddleMcpServer;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match puddle_db::ping(&state.db_pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    };
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "puddle-mcp running".to_string() },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

pub fn router(
    server: PuddleMcpServer,
    auth: AuthManager,
    db_pool: DbPool,
    mount_path: &str,
) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    );

    let protected = Router::new()
        .nest_service(mount_path, mcp_service)
        .layer(middleware::from_fn_with_state(auth, require_bearer));

    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { db_pool })
        .merge(protected)
}

/// Serves until Ctrl-C, then drains for at most `graceful_shutdown_secs`.
pub async fn serve(
    config: &ServerConfig,
    server: PuddleMcpServer,
    auth: AuthManager,
    db_pool: DbPool,
) -> std::io::Result<()> {
    let address = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "mcp.transport.http",
        bind_address = %address,
        mount_path = %config.mount_path,
        auth_required = auth.is_auth_required(),
        "serving MCP over streamable HTTP"
    );

    let app = router(server, auth, db_pool, &config.mount_path);
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let grace = Duration::from_secs(config.graceful_shutdown_secs);

    let serving = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(event_name = "mcp.shutdown.signal_error", error = %error, "ctrl-c failed");
        }
        info!(event_name = "mcp.shutdown.requested", "shutdown requested; draining connections");
        signal.notify_one();
    });

    tokio::select! {
        result = serving.into_future() => result,
        () = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                event_name = "mcp.shutdown.forced",
                grace_secs = grace.as_secs(),
                "connections still open after the grace period"
            );
            Ok(())
        }
    }
}
