use solrsmart_backend::{CancellationToken, Settings};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod metrics;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let engine = settings.build_engine()?;
    let schema_ttl = engine.cache().ttl();
    let shutdown = CancellationToken::new();
    let app = routes::router(routes::AppState {
        engine,
        shutdown: shutdown.clone(),
    });

    let addr: SocketAddr = settings.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        solr = %settings.solr_url,
        collection = %settings.default_collection,
        schema_ttl_secs = schema_ttl.as_secs(),
        "http listening on {}",
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    info!("server stopped");
    Ok(())
}

// In-flight searches observe the cancelled token and stop at their next call.
async fn shutdown_signal(token: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
    token.cancel();
}
