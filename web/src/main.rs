//! Loyalty ledger HTTP server.

use anyhow::Context;
use salon_loyalty_core::StaticEarningRule;
use salon_loyalty_postgres::{PostgresBookingSource, PostgresLedgerStore};
use salon_loyalty_runtime::metrics::MetricsExporter;
use salon_loyalty_runtime::{Config, LoyaltyLedger};
use salon_loyalty_web::{AppState, build_router};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.server.log_filter)
                .unwrap_or_else(|_| "salon_loyalty=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting loyalty ledger server");
    if config.earning_rule.is_none() {
        warn!("No earning rule configured; awards will fail until one is set");
    }

    let metrics = MetricsExporter::install().context("failed to install metrics recorder")?;

    let pool = salon_loyalty_postgres::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await
    .context("failed to connect to PostgreSQL")?;

    let store = PostgresLedgerStore::from_pool(pool.clone());
    store.migrate().await.context("failed to run migrations")?;
    info!("Migrations applied");

    let ledger = LoyaltyLedger::new(
        Arc::new(store),
        Arc::new(PostgresBookingSource::new(pool)),
        Arc::new(StaticEarningRule::from(config.earning_rule.clone())),
    )
    .with_retry_policy(config.retry.policy());

    let app = build_router(AppState::new(ledger).with_metrics(metrics));

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
