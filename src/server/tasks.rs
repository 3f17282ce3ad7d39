use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use taskpilot_core_types::{StepRecord, Task, TaskId, TaskLogEntry};

use crate::errors::ApiError;
use crate::gateway::ExecuteTaskResponse;

use super::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateTaskRequest {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ExecuteRequest {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    limit: Option<usize>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub(super) async fn create_task_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let goal = request.goal.unwrap_or_default();
    let task_id = state.gateway.submit(&goal, request.user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "taskId": task_id }))))
}

pub(super) async fn list_tasks_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.gateway.store().list_tasks(limit).await?))
}

pub(super) async fn get_task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task_id = TaskId::from(task_id);
    state
        .gateway
        .store()
        .get_task(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))
}

pub(super) async fn task_steps_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<StepRecord>>, ApiError> {
    let steps = state.gateway.store().steps(&TaskId::from(task_id)).await?;
    Ok(Json(steps))
}

pub(super) async fn task_logs_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<TaskLogEntry>>, ApiError> {
    let logs = state.gateway.store().logs(&TaskId::from(task_id)).await?;
    Ok(Json(logs))
}

/// Engine boundary: runs the task to completion before responding.
pub(super) async fn execute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteTaskResponse>, ApiError> {
    let request = body(payload)?;
    let (Some(goal), Some(task_id)) = (request.goal, request.task_id) else {
        return Err(ApiError::BadRequest("Goal and taskId are required".into()));
    };
    if task_id.trim().is_empty() {
        return Err(ApiError::BadRequest("Goal and taskId are required".into()));
    }
    let report = state
        .gateway
        .execute_report(TaskId::from(task_id), &goal)
        .await?;
    Ok(Json(report))
}
