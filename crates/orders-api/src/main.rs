//! Orders API server entry point.

use std::sync::Arc;

use orders_api::config::ApiConfig;
use orders_api::error::AppError;
use orders_api::routes;
use orders_api::state::AppState;
use orders_core::clock::SystemClock;
use orders_core::id::RandomIdGenerator;
use orders_runtime::{shutdown, telemetry};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let _telemetry = telemetry::init("orders-api")?;

    tracing::info!("Starting orders API server");

    let config = ApiConfig::from_env()?;

    // One queue client for the lifetime of the process.
    let queue = orders_queue::connect(&config.queue.connection_string).await?;

    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(RandomIdGenerator),
        queue,
        config.queue.queue_name.clone(),
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        "Listening on {} (queue {})",
        listener.local_addr()?,
        config.queue.queue_name
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await?;

    tracing::info!("Orders API server stopped");
    Ok(())
}
