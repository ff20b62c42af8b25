//! Document shapes persisted in MongoDB: `tasks`, `events`, `reservations`.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row: Option<u64>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub task_id: String,
    pub file_path: String,
    pub original_file_name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub errors: Vec<RowError>,
    pub worker_id: Option<String>,
    pub processing_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new_pending(task_id: String, file_path: String, original_file_name: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            file_path,
            original_file_name,
            status: TaskStatus::Pending,
            errors: Vec::new(),
            worker_id: None,
            processing_at: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    New,
    Processing,
    Published,
    // No distinct `Failed` terminal state: a non-retryable failure is
    // represented as `Processed` with `error` populated. See the design
    // note on event/processed terminal status.
    Processed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventError {
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedPayload {
    pub task_id: String,
    pub file_path: String,
    pub original_file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_name: String,
    pub payload: TaskCreatedPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_name: String,
    pub event: EventEnvelope,
    pub status: EventStatus,
    pub worker_id: Option<String>,
    pub processing_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<EventError>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn task_created(payload: TaskCreatedPayload) -> Self {
        Self {
            id: None,
            event_name: "task.created.event".to_string(),
            event: EventEnvelope { event_name: "task.created.event".to_string(), payload },
            status: EventStatus::New,
            worker_id: None,
            processing_at: None,
            published_at: None,
            processed_at: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Canceled,
    Completed,
}

impl std::str::FromStr for ReservationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CANCELED" => Ok(Self::Canceled),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub reservation_id: String,
    pub guest_name: String,
    pub status: ReservationStatus,
    pub check_in_date: String,
    pub check_out_date: String,
}
