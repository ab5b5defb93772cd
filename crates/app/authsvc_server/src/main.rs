//! authsvc HTTP server binary.
//!
//! Connects to PostgreSQL, runs migrations and serves the token API until
//! Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use authsvc_api::AppState;
use authsvc_core::AuthService;
use authsvc_core::config::TokenConfig;
use authsvc_core::store::PgCredentialStore;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// Interval between sweeps of expired refresh tokens.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "authsvc_server", about = "Access/refresh token service")]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/authsvc"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| {
                    tracing_subscriber::EnvFilter::try_new(
                        "info,authsvc_api=debug,authsvc_core=debug",
                    )
                })?,
        )
        .init();

    let args = Args::parse();
    let tokens = TokenConfig::from_env()?;

    info!(
        port = args.port,
        max_connections = args.max_connections,
        access_ttl_secs = tokens.access_ttl.num_seconds(),
        "starting authsvc_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    authsvc_api::migrate(&pool).await?;

    let store = Arc::new(PgCredentialStore::new(pool));
    let service = Arc::new(AuthService::from_config(&tokens, store));

    let purge = tokio::spawn({
        let service = service.clone();
        async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = service.purge_expired().await {
                    warn!(error = %e, "refresh token purge failed");
                }
            }
        }
    });

    let app = authsvc_api::router(AppState { service });

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", args.host, args.port)).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    purge.abort();
    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
