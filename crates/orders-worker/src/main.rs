//! Orders worker entry point.

use std::sync::Arc;

use orders_runtime::{shutdown, telemetry};
use orders_worker::config::WorkerConfig;
use orders_worker::error::WorkerError;
use orders_worker::{MessageProcessor, OrderCreatedHandler, SimulatedWork};

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    let _telemetry = telemetry::init("orders-worker")?;

    tracing::info!("Starting orders worker");

    let config = WorkerConfig::from_env()?;
    let queue = orders_queue::connect(&config.queue.connection_string).await?;

    let handler = Arc::new(OrderCreatedHandler::new(SimulatedWork::new(
        config.work_delay,
    )));
    let processor = MessageProcessor::new(
        queue,
        config.queue.queue_name.clone(),
        config.processor,
        handler,
    );

    let (trigger, listener) = shutdown::channel();
    tokio::spawn(shutdown::trigger_on_signal(trigger));

    tracing::info!(
        queue = %config.queue.queue_name,
        max_concurrent_calls = config.processor.max_concurrent_calls,
        "Waiting for messages"
    );
    let stats = processor.run(listener).await;

    tracing::info!(
        completed = stats.completed,
        abandoned = stats.abandoned,
        dead_lettered = stats.dead_lettered,
        "Orders worker stopped"
    );
    Ok(())
}
