//! `GET /v1/task/status/:taskId`: a read-only projection of the Task
//! document; never exposes `workerId`/`processingAt`, which are internal
//! claim-lease bookkeeping.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use res_core::AppError;
use res_store::{RowError, TaskStatus};
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub errors: Vec<RowError>,
    pub original_file_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Json<TaskStatusResponse>> {
    let task = state
        .tasks
        .find_by_id(&task_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("task {task_id}")))?;

    Ok(Json(TaskStatusResponse {
        task_id: task.task_id,
        status: task.status,
        errors: task.errors,
        original_file_name: task.original_file_name,
        started_at: task.started_at,
        completed_at: task.completed_at,
        created_at: task.created_at,
        updated_at: task.updated_at,
    }))
}
