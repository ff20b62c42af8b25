//! The competing-consumers task processor: claims a task, streams and
//! validates its workbook, upserts reservations, and finalizes the
//! task/event pair, all inside one store transaction.

use crate::topology::QUEUE_WORKER_TASK;
use crate::xlsx;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use mongodb::bson::oid::ObjectId;
use res_blob::BlobStore;
use res_store::{
    EventError, EventRepository, ReservationRepository, RowError, Store, TaskCreatedPayload, TaskRepository, TaskStatus,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Configurable ceiling on rows processed inside a single transaction
/// (design decision: see the open question on transaction scoping).
pub const MAX_ROWS_PER_TRANSACTION: usize = 20_000;

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "eventId")]
    event_id: Option<String>,
    #[serde(rename = "eventName")]
    #[allow(dead_code)]
    event_name: Option<String>,
    payload: Option<TaskCreatedPayload>,
}

pub struct ProcessorHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl ProcessorHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.await;
    }
}

pub struct TaskProcessor {
    channel: Channel,
    store: Store,
    blob_store: Arc<dyn BlobStore>,
    worker_id: String,
}

impl TaskProcessor {
    pub fn new(channel: Channel, store: Store, blob_store: Arc<dyn BlobStore>, worker_id: String) -> Self {
        Self { channel, store, blob_store, worker_id }
    }

    pub fn spawn(self) -> ProcessorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let join_handle = tokio::spawn(async move {
            if let Err(err) = self.channel.basic_qos(1, BasicQosOptions::default()).await {
                error!(error = %err, "failed to set prefetch, processor exiting");
                return;
            }

            let mut consumer = match self
                .channel
                .basic_consume(
                    QUEUE_WORKER_TASK,
                    &format!("processor-{}", self.worker_id),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
            {
                Ok(c) => c,
                Err(err) => {
                    error!(error = %err, "failed to start consuming, processor exiting");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("task processor shutting down");
                        break;
                    }
                    next = consumer.next() => {
                        let Some(delivery) = next else { break };
                        match delivery {
                            Ok(delivery) => {
                                let body = delivery.data.clone();
                                let outcome = self.handle_message(&body).await;
                                match outcome {
                                    MessageOutcome::Ack => {
                                        let _ = delivery.ack(BasicAckOptions::default()).await;
                                    }
                                    MessageOutcome::NackRequeueFalse => {
                                        let _ = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
                                    }
                                }
                            }
                            Err(err) => warn!(error = %err, "consumer delivery error"),
                        }
                    }
                }
            }
        });

        ProcessorHandle { shutdown_tx, join_handle }
    }

    #[instrument(skip(self, body))]
    async fn handle_message(&self, body: &[u8]) -> MessageOutcome {
        let envelope: InboundEnvelope = match serde_json::from_slice(body) {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "dropping unparseable message");
                return MessageOutcome::Ack;
            }
        };

        let (Some(event_id), Some(payload)) = (envelope.event_id, envelope.payload) else {
            warn!("dropping message with missing eventId or payload");
            return MessageOutcome::Ack;
        };

        let event_id = match ObjectId::parse_str(&event_id) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "dropping message with malformed eventId");
                return MessageOutcome::Ack;
            }
        };

        self.process_task(event_id, payload).await
    }

    async fn process_task(&self, event_id: ObjectId, payload: TaskCreatedPayload) -> MessageOutcome {
        let tasks = TaskRepository::new(&self.store);
        let events = EventRepository::new(&self.store);

        let mut session = match self.store.db.client().start_session().await {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to start session");
                return MessageOutcome::NackRequeueFalse;
            }
        };
        if let Err(err) = session.start_transaction().with_options(res_store::transaction_options()).await {
            error!(error = %err, "failed to start transaction");
            return MessageOutcome::NackRequeueFalse;
        }

        let claimed = match tasks.claim_for_processing(&mut session, &payload.task_id, &self.worker_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                // Already owned, already terminal, or a duplicate delivery.
                let _ = session.commit_transaction().await;
                return MessageOutcome::Ack;
            }
            Err(err) if err.is_transient() => {
                let _ = session.abort_transaction().await;
                warn!(task_id = %payload.task_id, error = %err, "transient claim conflict, routing to delay queue");
                return MessageOutcome::NackRequeueFalse;
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                error!(task_id = %payload.task_id, error = %err, "failed to claim task");
                return MessageOutcome::Ack;
            }
        };
        let _ = claimed;

        let download = self.blob_store.get(&payload.file_path).await;
        let bytes = match download {
            Ok(result) => match buffer_stream(result.stream).await {
                Ok(b) => b,
                Err(err) => {
                    let _ = session.abort_transaction().await;
                    return self.fail_task_outside_transaction(&tasks, &events, &event_id, &payload, format!("download failed: {err}")).await;
                }
            },
            Err(err) => {
                let _ = session.abort_transaction().await;
                return self.fail_task_outside_transaction(&tasks, &events, &event_id, &payload, format!("download failed: {err}")).await;
            }
        };

        let parsed = match xlsx::parse(bytes) {
            Ok(p) => p,
            Err(message) => {
                let _ = session.abort_transaction().await;
                return self.fail_task_outside_transaction(&tasks, &events, &event_id, &payload, message).await;
            }
        };

        if parsed.reservations.len() > MAX_ROWS_PER_TRANSACTION {
            let _ = session.abort_transaction().await;
            return self
                .fail_task_outside_transaction(&tasks, &events, &event_id, &payload, "file exceeds maximum row count".to_string())
                .await;
        }

        let reservations = ReservationRepository::new(&self.store);
        for reservation in &parsed.reservations {
            if let Err(err) = reservations.upsert(&mut session, reservation).await {
                let _ = session.abort_transaction().await;
                if err.is_transient() {
                    warn!(task_id = %payload.task_id, error = %err, "transient conflict upserting reservation, routing to delay queue");
                    return MessageOutcome::NackRequeueFalse;
                }
                error!(task_id = %payload.task_id, error = %err, "failed to upsert reservation");
                return MessageOutcome::Ack;
            }
        }

        let final_status = if parsed.errors.is_empty() { TaskStatus::Completed } else { TaskStatus::Failed };

        if let Err(err) = tasks.finalize(&mut session, &payload.task_id, final_status, parsed.errors.clone()).await {
            let _ = session.abort_transaction().await;
            if err.is_transient() {
                return MessageOutcome::NackRequeueFalse;
            }
            error!(task_id = %payload.task_id, error = %err, "failed to finalize task");
            return MessageOutcome::Ack;
        }

        let event_error = if parsed.errors.is_empty() {
            None
        } else {
            Some(EventError {
                message: format!("processing completed with {} errors", parsed.errors.len()),
                details: serde_json::to_value(&parsed.errors).ok(),
            })
        };

        if let Err(err) = events.mark_processed(&mut session, &event_id, event_error).await {
            let _ = session.abort_transaction().await;
            error!(task_id = %payload.task_id, error = %err, "failed to mark event processed");
            return MessageOutcome::Ack;
        }

        match session.commit_transaction().await {
            Ok(()) => MessageOutcome::Ack,
            Err(err) => {
                error!(task_id = %payload.task_id, error = %err, "commit failed");
                MessageOutcome::NackRequeueFalse
            }
        }
    }

    /// Used when the failure happens before any transaction work can be
    /// trusted (download/parse failures): mark the task failed best-effort,
    /// outside any transaction, then ack so the poison message doesn't loop.
    async fn fail_task_outside_transaction(
        &self,
        tasks: &TaskRepository,
        events: &EventRepository,
        event_id: &ObjectId,
        payload: &TaskCreatedPayload,
        message: String,
    ) -> MessageOutcome {
        let errors = vec![RowError { row: None, error: message.clone() }];

        let mut session = match self.store.db.client().start_session().await {
            Ok(s) => s,
            Err(_) => return MessageOutcome::Ack,
        };
        if session.start_transaction().with_options(res_store::transaction_options()).await.is_err() {
            return MessageOutcome::Ack;
        }

        let _ = tasks.finalize(&mut session, &payload.task_id, TaskStatus::Failed, errors.clone()).await;
        let _ = events
            .mark_processed(&mut session, event_id, Some(EventError { message, details: serde_json::to_value(&errors).ok() }))
            .await;
        let _ = session.commit_transaction().await;

        MessageOutcome::Ack
    }
}

enum MessageOutcome {
    Ack,
    NackRequeueFalse,
}

async fn buffer_stream(mut stream: res_blob::ByteStream) -> Result<Vec<u8>, std::io::Error> {
    use futures::StreamExt as _;
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}
