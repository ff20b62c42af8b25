//! The transactional outbox dispatcher: drains `NEW` events onto the bus
//! and recovers claims abandoned by a crashed worker.

use crate::error::BusResult;
use crate::topology::EXCHANGE_EVENTS;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use res_store::{EventRepository, Store, TaskCreatedPayload};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

const PUBLISH_TICK: Duration = Duration::from_secs(1);
const RECOVERY_TICK: Duration = Duration::from_secs(120);

/// The wire envelope a consumer actually receives: the event's own id plus
/// its stored `{eventName, payload}` body, per the bus wire contract.
/// Distinct from the stored `EventEnvelope`, which has no need to carry its
/// own document id.
#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "eventId")]
    event_id: String,
    #[serde(rename = "eventName")]
    event_name: &'a str,
    payload: &'a TaskCreatedPayload,
}

pub struct DispatcherHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl DispatcherHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.await;
    }
}

pub struct OutboxDispatcher {
    channel: Channel,
    events: EventRepository,
    store: Store,
    worker_id: String,
}

impl OutboxDispatcher {
    pub fn new(channel: Channel, store: Store, worker_id: String) -> Self {
        let events = EventRepository::new(&store);
        Self { channel, events, store, worker_id }
    }

    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let join_handle = tokio::spawn(async move {
            let mut publish_interval = tokio::time::interval(PUBLISH_TICK);
            let mut recovery_interval = tokio::time::interval(RECOVERY_TICK);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("outbox dispatcher shutting down");
                        break;
                    }
                    _ = publish_interval.tick() => {
                        if let Err(err) = self.publish_new_events().await {
                            error!(error = %err, "publish_new_events tick failed");
                        }
                    }
                    _ = recovery_interval.tick() => {
                        if let Err(err) = self.recover_stale_events().await {
                            error!(error = %err, "recover_stale_events tick failed");
                        }
                    }
                }
            }
        });

        DispatcherHandle { shutdown_tx, join_handle }
    }

    #[instrument(skip(self))]
    async fn publish_new_events(&self) -> BusResult<()> {
        let claimed = match self.events.claim_new_batch(&self.worker_id).await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "failed to claim new events");
                return Ok(());
            }
        };

        for event in claimed {
            let Some(event_id) = event.id else { continue };
            let outbound = OutboundEnvelope {
                event_id: event_id.to_hex(),
                event_name: &event.event.event_name,
                payload: &event.event.payload,
            };
            let payload = match serde_json::to_vec(&outbound) {
                Ok(p) => p,
                Err(err) => {
                    warn!(error = %err, "failed to encode event payload, leaving it for recovery");
                    continue;
                }
            };

            let mut session = match self.store.db.client().start_session().await {
                Ok(s) => s,
                Err(err) => {
                    warn!(error = %err, "failed to start session for publish");
                    continue;
                }
            };
            if let Err(err) = session.start_transaction().with_options(res_store::transaction_options()).await {
                warn!(error = %err, "failed to start transaction for publish");
                continue;
            }

            let publish_result = self
                .channel
                .basic_publish(
                    EXCHANGE_EVENTS,
                    &event.event_name,
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default().with_delivery_mode(2),
                )
                .await;

            let publish_ok = match publish_result {
                Ok(confirm) => confirm.await.is_ok(),
                Err(err) => {
                    warn!(error = %err, "bus publish failed, event will be recovered");
                    false
                }
            };

            if !publish_ok {
                let _ = session.abort_transaction().await;
                continue;
            }

            match self.events.mark_published(&mut session, &event_id, &self.worker_id).await {
                Ok(true) => {
                    if session.commit_transaction().await.is_err() {
                        warn!(event_id = %event_id, "commit failed after publish, duplicate redelivery expected");
                    }
                }
                Ok(false) => {
                    // Lost the claim race to a concurrent recovery tick; the
                    // publish already happened, which is an accepted duplicate.
                    let _ = session.abort_transaction().await;
                }
                Err(err) => {
                    warn!(event_id = %event_id, error = %err, "failed to mark event published");
                    let _ = session.abort_transaction().await;
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn recover_stale_events(&self) -> BusResult<()> {
        match self.events.recover_stale().await {
            Ok(count) if count > 0 => info!(count, "recovered stale events"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "recover_stale_events failed"),
        }
        Ok(())
    }
}
