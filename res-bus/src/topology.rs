//! Declares the bus topology: exchanges, queues, bindings, and the
//! delay-queue/DLX pair that gives bounded-delay retry.
//!
//! Declaration is idempotent: safe to run on every process startup.

use crate::error::BusResult;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tracing::info;

pub const EXCHANGE_EVENTS: &str = "x.events";
pub const EXCHANGE_WORKER: &str = "x.worker";
pub const EXCHANGE_DLQ: &str = "x.dlq";

pub const QUEUE_WORKER_TASK: &str = "q.worker.task";
pub const QUEUE_DLQ_WORKER_TASK: &str = "q.dlq.worker-task";

pub const ROUTING_TASK_EVENT: &str = "task.event";
pub const ROUTING_DLQ_PUBLISH: &str = "dlq-publish";
pub const ROUTING_DLQ_DELAY: &str = "dlq-delay";

pub const DELAY_QUEUE_TTL_MS: i32 = 120_000;

pub async fn declare(channel: &Channel) -> BusResult<()> {
    channel
        .exchange_declare(
            EXCHANGE_EVENTS,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            EXCHANGE_WORKER,
            ExchangeKind::Topic,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_declare(
            EXCHANGE_DLQ,
            ExchangeKind::Topic,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_bind(
            EXCHANGE_WORKER,
            EXCHANGE_EVENTS,
            "#.event",
            Default::default(),
            FieldTable::default(),
        )
        .await?;

    channel
        .exchange_bind(
            EXCHANGE_WORKER,
            EXCHANGE_DLQ,
            ROUTING_DLQ_PUBLISH,
            Default::default(),
            FieldTable::default(),
        )
        .await?;

    let mut worker_task_args = FieldTable::default();
    worker_task_args.insert("x-dead-letter-exchange".into(), EXCHANGE_DLQ.into());
    worker_task_args.insert("x-dead-letter-routing-key".into(), ROUTING_DLQ_DELAY.into());

    channel
        .queue_declare(
            QUEUE_WORKER_TASK,
            QueueDeclareOptions { durable: true, ..Default::default() },
            worker_task_args,
        )
        .await?;

    channel
        .queue_bind(QUEUE_WORKER_TASK, EXCHANGE_WORKER, ROUTING_TASK_EVENT, QueueBindOptions::default(), FieldTable::default())
        .await?;
    channel
        .queue_bind(QUEUE_WORKER_TASK, EXCHANGE_WORKER, ROUTING_DLQ_PUBLISH, QueueBindOptions::default(), FieldTable::default())
        .await?;

    let mut dlq_delay_args = FieldTable::default();
    dlq_delay_args.insert("x-dead-letter-exchange".into(), EXCHANGE_DLQ.into());
    dlq_delay_args.insert("x-dead-letter-routing-key".into(), ROUTING_DLQ_PUBLISH.into());
    dlq_delay_args.insert("x-message-ttl".into(), DELAY_QUEUE_TTL_MS.into());

    channel
        .queue_declare(
            QUEUE_DLQ_WORKER_TASK,
            QueueDeclareOptions { durable: true, ..Default::default() },
            dlq_delay_args,
        )
        .await?;

    channel
        .queue_bind(QUEUE_DLQ_WORKER_TASK, EXCHANGE_DLQ, ROUTING_DLQ_DELAY, QueueBindOptions::default(), FieldTable::default())
        .await?;

    info!("bus topology declared");
    Ok(())
}
