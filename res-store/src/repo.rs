//! Repositories for `tasks`, `events`, and `reservations`, including the
//! atomic claim/finalize operations the outbox dispatcher and task
//! processor depend on.

use crate::db::Store;
use crate::error::{StoreError, StoreResult};
use crate::models::{Event, EventError, EventStatus, Reservation, RowError, Task, TaskCreatedPayload, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{ReadConcern, TransactionOptions, WriteConcern};
use mongodb::{ClientSession, Collection};

pub const STALE_EVENT_THRESHOLD_SECONDS: i64 = 60;
pub const EVENT_CLAIM_BATCH_SIZE: i64 = 500;

fn majority_transaction_options() -> TransactionOptions {
    TransactionOptions::builder()
        .read_concern(ReadConcern::majority())
        .write_concern(WriteConcern::majority())
        .build()
}

#[derive(Clone)]
pub struct TaskRepository {
    collection: Collection<Task>,
}

impl TaskRepository {
    pub fn new(store: &Store) -> Self {
        Self { collection: store.db.collection("tasks") }
    }

    pub async fn find_by_id(&self, task_id: &str) -> StoreResult<Option<Task>> {
        Ok(self.collection.find_one(doc! { "_id": task_id }).await?)
    }

    /// Atomic `findOneAndUpdate` claim: only succeeds for a `PENDING` task.
    pub async fn claim_for_processing(
        &self,
        session: &mut ClientSession,
        task_id: &str,
        worker_id: &str,
    ) -> StoreResult<Option<Task>> {
        let now = Utc::now();
        let result = self
            .collection
            .find_one_and_update(
                doc! { "_id": task_id, "status": "PENDING" },
                doc! { "$set": {
                    "status": "IN_PROGRESS",
                    "startedAt": now,
                    "workerId": worker_id,
                    "processingAt": now,
                    "updatedAt": now,
                } },
            )
            .session(&mut *session)
            .await?;
        Ok(result)
    }

    pub async fn finalize(
        &self,
        session: &mut ClientSession,
        task_id: &str,
        final_status: TaskStatus,
        errors: Vec<RowError>,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let status_str = match final_status {
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            _ => return Err(StoreError::write_conflict("finalize requires a terminal status")),
        };

        let result = self
            .collection
            .update_one(
                doc! { "_id": task_id },
                doc! { "$set": {
                    "status": status_str,
                    "completedAt": now,
                    "errors": mongodb::bson::to_bson(&errors).map_err(|e| StoreError::write_conflict(e.to_string()))?,
                    "workerId": mongodb::bson::Bson::Null,
                    "processingAt": mongodb::bson::Bson::Null,
                    "updatedAt": now,
                } },
            )
            .session(&mut *session)
            .await?;

        if result.modified_count == 0 {
            return Err(StoreError::write_conflict(format!("task {task_id} vanished before finalize")));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventRepository {
    collection: Collection<Event>,
}

impl EventRepository {
    pub fn new(store: &Store) -> Self {
        Self { collection: store.db.collection("events") }
    }

    /// Claims up to `EVENT_CLAIM_BATCH_SIZE` `NEW` events for `worker_id`,
    /// oldest first, and returns the claimed documents.
    pub async fn claim_new_batch(&self, worker_id: &str) -> StoreResult<Vec<Event>> {
        use futures::stream::TryStreamExt;

        let now = Utc::now();

        // `updateMany` has no `limit`, so the batch is selected by id first
        // (oldest `EVENT_CLAIM_BATCH_SIZE` NEW events) and the claim is then
        // scoped to exactly those ids. Projected to `_id` only, so this runs
        // against the collection's raw `Document` view rather than `Event`
        // (whose other fields aren't optional).
        let id_only = self.collection.clone_with_type::<mongodb::bson::Document>();
        let candidate_ids: Vec<ObjectId> = id_only
            .find(doc! { "status": "NEW" })
            .sort(doc! { "createdAt": 1 })
            .limit(EVENT_CLAIM_BATCH_SIZE)
            .projection(doc! { "_id": 1 })
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .filter_map(|doc| doc.get_object_id("_id").ok().copied())
            .collect();

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.collection
            .update_many(
                doc! { "_id": { "$in": &candidate_ids }, "status": "NEW" },
                doc! { "$set": { "status": "PROCESSING", "workerId": worker_id, "processingAt": now } },
            )
            .await?;

        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": &candidate_ids }, "status": "PROCESSING", "workerId": worker_id })
            .sort(doc! { "createdAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Transitions a claimed event to `PUBLISHED`, but only if this worker
    /// still holds the claim (guards against an interleaved recovery tick).
    pub async fn mark_published(&self, session: &mut ClientSession, event_id: &ObjectId, worker_id: &str) -> StoreResult<bool> {
        let now = Utc::now();
        let result = self
            .collection
            .update_one(
                doc! { "_id": event_id, "status": "PROCESSING", "workerId": worker_id },
                doc! { "$set": { "status": "PUBLISHED", "publishedAt": now },
                       "$unset": { "workerId": "", "processingAt": "" } },
            )
            .session(&mut *session)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Resets events whose claim has expired back to `NEW` so another
    /// dispatcher can pick them up.
    pub async fn recover_stale(&self) -> StoreResult<u64> {
        let threshold = Utc::now() - Duration::seconds(STALE_EVENT_THRESHOLD_SECONDS);
        let result = self
            .collection
            .update_many(
                doc! { "status": "PROCESSING", "processingAt": { "$lt": threshold } },
                doc! { "$set": { "status": "NEW" }, "$unset": { "workerId": "", "processingAt": "" } },
            )
            .await?;
        Ok(result.modified_count)
    }

    pub async fn mark_processed(
        &self,
        session: &mut ClientSession,
        event_id: &ObjectId,
        error: Option<EventError>,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let error_bson = match &error {
            Some(e) => mongodb::bson::to_bson(e).map_err(|e| StoreError::write_conflict(e.to_string()))?,
            None => mongodb::bson::Bson::Null,
        };
        self.collection
            .update_one(
                doc! { "_id": event_id },
                doc! { "$set": { "status": "PROCESSED", "processedAt": now, "error": error_bson } },
            )
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ReservationRepository {
    collection: Collection<Reservation>,
}

impl ReservationRepository {
    pub fn new(store: &Store) -> Self {
        Self { collection: store.db.collection("reservations") }
    }

    pub async fn upsert(&self, session: &mut ClientSession, reservation: &Reservation) -> StoreResult<()> {
        self.collection
            .update_one(
                doc! { "reservationId": &reservation.reservation_id },
                doc! { "$set": {
                    "guestName": &reservation.guest_name,
                    "status": mongodb::bson::to_bson(&reservation.status).map_err(|e| StoreError::write_conflict(e.to_string()))?,
                    "checkInDate": &reservation.check_in_date,
                    "checkOutDate": &reservation.check_out_date,
                } },
            )
            .upsert(true)
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

/// Creates a Task + its outbox Event atomically, returning the new task id.
/// This is the commit point of the upload assembler (§4.1 step 4).
pub async fn create_task_with_event(
    store: &Store,
    tasks: &TaskRepository,
    events: &EventRepository,
    file_path: String,
    original_file_name: String,
) -> StoreResult<String> {
    let task_id = uuid::Uuid::new_v4().to_string();
    let task = Task::new_pending(task_id.clone(), file_path.clone(), original_file_name.clone());
    let event = Event::task_created(TaskCreatedPayload { task_id: task_id.clone(), file_path, original_file_name });

    let mut session = store.db.client().start_session().await?;
    session.start_transaction().with_options(majority_transaction_options()).await?;

    let run = async {
        tasks.collection.insert_one(&task).session(&mut session).await?;
        events.collection.insert_one(&event).session(&mut session).await?;
        Ok::<_, StoreError>(())
    }
    .await;

    match run {
        Ok(()) => {
            session.commit_transaction().await?;
            Ok(task_id)
        }
        Err(err) => {
            let _ = session.abort_transaction().await;
            Err(err)
        }
    }
}

pub fn transaction_options() -> TransactionOptions {
    majority_transaction_options()
}
