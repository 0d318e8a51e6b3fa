use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::lessons::UpdateLessonRequest,
    dto::progress::{LessonProgressView, ProgressPatchRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Lesson,
    response::ApiResponse,
    services::{lesson_service, progress_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_lesson))
        .route("/{id}", put(update_lesson))
        .route("/{id}", delete(delete_lesson))
        .route("/{id}/progress", get(get_progress).post(record_watch))
        .route("/{id}/complete", post(complete_lesson))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Get lesson; paid video URL withheld from non-enrolled viewers", body = ApiResponse<Lesson>),
        (status = 404, description = "Lesson not found"),
    ),
    tag = "Lessons"
)]
pub async fn get_lesson(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Lesson>>> {
    let resp = lesson_service::get_lesson(&state, viewer.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = UpdateLessonRequest,
    responses(
        (status = 200, description = "Updated lesson", body = ApiResponse<Lesson>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> AppResult<Json<ApiResponse<Lesson>>> {
    let resp = lesson_service::update_lesson(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/lessons/{id}",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Deleted lesson"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = lesson_service::delete_lesson(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Progress for the caller; missing row reads as not started", body = ApiResponse<LessonProgressView>),
        (status = 404, description = "Lesson not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Progress"
)]
pub async fn get_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LessonProgressView>>> {
    let resp = progress_service::get_progress(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = ProgressPatchRequest,
    responses(
        (status = 200, description = "Watch time recorded", body = ApiResponse<LessonProgressView>),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Progress"
)]
pub async fn record_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressPatchRequest>,
) -> AppResult<Json<ApiResponse<LessonProgressView>>> {
    let resp = progress_service::record_watch(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/complete",
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Lesson marked complete (idempotent)", body = ApiResponse<LessonProgressView>),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Progress"
)]
pub async fn complete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LessonProgressView>>> {
    let resp = progress_service::complete_lesson(&state, &user, id).await?;
    Ok(Json(resp))
}
