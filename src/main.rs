use std::sync::Arc;

use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use mealtrack::api;
use mealtrack::config::Config;
use mealtrack::error::AppError;
use mealtrack::payment::AutoCapture;
use mealtrack::realtime::locations::run_location_flush;
use mealtrack::realtime::ticket::TicketIssuer;
use mealtrack::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let tickets = TicketIssuer::new(
        config.room_ticket_secret.as_bytes(),
        config.room_ticket_ttl_secs,
    );
    let shared_state = Arc::new(AppState::new(
        config.event_buffer_size,
        tickets,
        Arc::new(AutoCapture),
    ));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_location_flush(
        shared_state.clone(),
        Duration::from_secs(config.location_flush_secs),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    // Drain fan-out subscribers so live connections close before exit.
    shared_state.hub.shutdown();
    tracing::info!("fan-out hub drained, exiting");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
