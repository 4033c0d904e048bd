//! Worker tests against the embedded broker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orders_core::event::OrderCreatedEvent;
use orders_core::message::QueueMessage;
use orders_core::queue::MessageQueue;
use orders_queue::InMemoryQueue;
use orders_runtime::shutdown;
use orders_worker::{
    MessageProcessor, OrderCreatedHandler, ProcessorOptions, ProcessorStats, SimulatedWork,
};
use rust_decimal::Decimal;
use uuid::Uuid;

const QUEUE: &str = "orders";

fn options() -> ProcessorOptions {
    ProcessorOptions {
        receive_wait: Duration::from_millis(20),
        error_backoff: Duration::from_millis(10),
        max_delivery_count: Some(3),
        ..ProcessorOptions::default()
    }
}

async fn run_until_drained(broker: &Arc<InMemoryQueue>) -> ProcessorStats {
    let (trigger, listener) = shutdown::channel();
    let processor = MessageProcessor::new(
        broker.clone(),
        QUEUE,
        options(),
        Arc::new(OrderCreatedHandler::new(SimulatedWork::new(
            Duration::from_millis(5),
        ))),
    );
    let run = tokio::spawn(processor.run(listener));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !broker.is_empty(QUEUE) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_worker_drains_published_orders() {
    let broker = Arc::new(InMemoryQueue::new());
    for amount in [4250, 1999, 100] {
        let event = OrderCreatedEvent::new(
            Uuid::new_v4(),
            "Ana".into(),
            Decimal::new(amount, 2),
            Utc::now(),
        );
        broker
            .send(QUEUE, QueueMessage::from_event(&event))
            .await
            .unwrap();
    }

    let stats = run_until_drained(&broker).await;

    assert_eq!(stats.completed, 3);
    assert_eq!(stats.abandoned, 0);
    assert!(broker.dead_lettered(QUEUE).is_empty());
}

#[tokio::test]
async fn test_malformed_message_is_retried_then_dead_lettered() {
    let broker = Arc::new(InMemoryQueue::new());
    let poison = QueueMessage {
        message_id: "poison".into(),
        correlation_id: "poison".into(),
        content_type: "application/json".into(),
        subject: None,
        body: b"{\"OrderId\": 42}".to_vec(),
    };
    broker.send(QUEUE, poison.clone()).await.unwrap();
    let event = OrderCreatedEvent::new(
        Uuid::new_v4(),
        "Bruno".into(),
        Decimal::new(1000, 2),
        Utc::now(),
    );
    broker
        .send(QUEUE, QueueMessage::from_event(&event))
        .await
        .unwrap();

    let stats = run_until_drained(&broker).await;

    assert_eq!(stats.completed, 1);
    assert_eq!(stats.abandoned, 2);
    assert_eq!(stats.dead_lettered, 1);

    let dead = broker.dead_lettered(QUEUE);
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].message, poison);
    assert_eq!(dead[0].delivery_count, 3);
    assert!(dead[0].reason.contains("malformed"));
}
