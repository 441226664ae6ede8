use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::model::{NewTask, Task, TaskCategory, TaskPatch};
use crate::{
    auth::extractors::SessionUser,
    errors::{reject, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", patch(update_task).delete(delete_task))
        .route("/tasks/:id/toggle", post(toggle_task))
}

#[derive(Debug, Deserialize)]
pub struct TaskFilter {
    pub category: Option<TaskCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub completed: bool,
}

#[instrument(skip(state, _user))]
pub async fn list_tasks(
    State(state): State<AppState>,
    _user: SessionUser,
    Query(filter): Query<TaskFilter>,
) -> Json<Vec<Task>> {
    Json(state.tasks.list(filter.category).await)
}

#[instrument(skip(state, _user, body))]
pub async fn create_task(
    State(state): State<AppState>,
    _user: SessionUser,
    Json(body): Json<NewTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = body.validated().map_err(reject)?;
    let created = state.tasks.add(task).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, _user, body))]
pub async fn update_task(
    State(state): State<AppState>,
    _user: SessionUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskPatch>,
) -> AppResult<Json<Task>> {
    let patch = body.validated().map_err(reject)?;
    Ok(Json(state.tasks.update(id, patch).await.map_err(reject)?))
}

#[instrument(skip(state, _user))]
pub async fn toggle_task(
    State(state): State<AppState>,
    _user: SessionUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> AppResult<Json<Task>> {
    let task = state
        .tasks
        .toggle_complete(id, body.completed)
        .await
        .map_err(reject)?;
    Ok(Json(task))
}

#[instrument(skip(state, _user))]
pub async fn delete_task(
    State(state): State<AppState>,
    _user: SessionUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.tasks.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
