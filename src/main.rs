use api_gateway::{AppState, Args, router};
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let config = Args::parse().into_config()?;
    let state = Arc::new(AppState::from_config(&config)?);

    // stale rate-limit windows would otherwise pile up per client
    let purge_state = state.clone();
    let purge_every = config.rate_limit.window;
    tokio::spawn(async move {
        let mut ticker = interval(purge_every);
        loop {
            ticker.tick().await;
            purge_state.rate_limiter.purge_expired(Instant::now());
        }
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "API gateway listening");
    tracing::info!(cache_ttl_secs = config.cache_ttl.as_secs(), "cache configured");
    tracing::info!(
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout.as_millis() as u64,
        "circuit breakers configured"
    );
    tracing::info!(
        max = config.rate_limit.max,
        window_ms = config.rate_limit.window.as_millis() as u64,
        "rate limit configured"
    );
    tracing::info!(
        timeout_ms = config.backend_timeout.as_millis() as u64,
        "backend timeout configured"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
