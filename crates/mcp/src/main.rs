//! Puddle MCP server binary.
//!
//! ```bash
//! # HTTP transport (requires an auth key)
//! PUDDLE_AUTH_API_KEY=secret GEMINI_API_KEY=... puddle-mcp
//!
//! # Local single-user session over stdio, without embeddings
//! PUDDLE_SERVER_TRANSPORT=stdio PUDDLE_EMBEDDING_PROVIDER=disabled puddle-mcp
//! ```

use std::sync::Arc;

use anyhow::Result;
use puddle_core::audit::TracingAuditSink;
use puddle_core::config::{AppConfig, LoadOptions, LogFormat, TransportKind};
use puddle_mcp::{embedding, http, AuthManager, PuddleMcpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so the stdio transport keeps stdout for protocol frames.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    info!(
        event_name = "system.mcp.starting",
        correlation_id = "bootstrap",
        transport = config.server.transport.as_str(),
        embedding_provider = config.embedding.provider.as_str(),
        "starting puddle MCP server"
    );

    let db_pool = puddle_db::connect_from_config(&config.database).await?;
    puddle_db::migrations::run_pending(&db_pool).await?;

    let embedder = embedding::from_config(&config.embedding)?;
    let server = PuddleMcpServer::new(db_pool.clone(), embedder, Arc::new(TracingAuditSink));

    match config.server.transport {
        TransportKind::Stdio => server.run_stdio().await?,
        TransportKind::Http => {
            let auth = AuthManager::from_config(&config.auth);
            http::serve(&config.server, server, auth, db_pool.clone()).await?;
        }
    }

    db_pool.close().await;
    info!(event_name = "system.mcp.stopped", correlation_id = "bootstrap", "server stopped");
    Ok(())
}
