use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};
use serde::Deserialize;

use pdfqueue_core::app::{ControlApi, QueueStatus};
use pdfqueue_core::domain::{BatchKey, GroupId, TaskId};

use crate::errors::{ApiError, JsonBody};

/// Identifies one task in a request body.
#[derive(Debug, Deserialize)]
pub struct TaskRef {
    pub option_id: String,
    pub queue_id: String,
    pub task_id: String,
}

impl TaskRef {
    fn parts(&self) -> (BatchKey, GroupId, TaskId) {
        (
            BatchKey::new(self.option_id.as_str()),
            GroupId::new(self.queue_id.as_str()),
            TaskId::new(self.task_id.as_str()),
        )
    }
}

type StatusResult = Result<Json<QueueStatus>, ApiError>;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn list(Extension(control): Extension<Arc<ControlApi>>) -> StatusResult {
    Ok(Json(control.list_status().await?))
}

pub async fn run_all(Extension(control): Extension<Arc<ControlApi>>) -> StatusResult {
    Ok(Json(control.run_all().await?))
}

pub async fn run_task(Extension(control): Extension<Arc<ControlApi>>, JsonBody(task): JsonBody<TaskRef>) -> StatusResult {
    let (batch, group, task_id) = task.parts();
    Ok(Json(control.run_task(&batch, &group, &task_id).await?))
}

pub async fn delete_all(Extension(control): Extension<Arc<ControlApi>>) -> StatusResult {
    Ok(Json(control.delete_all().await?))
}

pub async fn delete_task(Extension(control): Extension<Arc<ControlApi>>, JsonBody(task): JsonBody<TaskRef>) -> StatusResult {
    let (batch, group, task_id) = task.parts();
    Ok(Json(control.delete_task(&batch, &group, &task_id).await?))
}
