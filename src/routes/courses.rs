use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::courses::{
        CourseList, CourseWithTeacher, CreateCourseRequest, UpdateCourseRequest,
        UpdateCourseStatusRequest,
    },
    dto::lessons::{CreateLessonRequest, LessonList},
    dto::progress::CourseProgressView,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Course, CourseEnrollment, Lesson},
    response::ApiResponse,
    routes::params::CourseQuery,
    services::{course_service, enrollment_service, lesson_service, progress_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/{id}", get(get_course))
        .route("/{id}", put(update_course))
        .route("/{id}", delete(delete_course))
        .route("/{id}/status", patch(update_course_status))
        .route("/{id}/lessons", get(list_lessons).post(create_lesson))
        .route("/{id}/enroll", post(enroll))
        .route("/{id}/progress", get(course_progress))
}

#[utoipa::path(
    get,
    path = "/api/courses",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Text match on title/description/category"),
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("level" = Option<String>, Query, description = "Filter by level: beginner, intermediate, advanced"),
        ("sort_by" = Option<String>, Query, description = "Sort by: created_at, rating, title"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List published courses", body = ApiResponse<CourseList>)
    ),
    tag = "Courses"
)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> AppResult<Json<ApiResponse<CourseList>>> {
    let resp = course_service::list_courses(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Get course with teacher name", body = ApiResponse<CourseWithTeacher>),
        (status = 404, description = "Course not found"),
    ),
    tag = "Courses"
)]
pub async fn get_course(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CourseWithTeacher>>> {
    let resp = course_service::get_course(&state, viewer.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Create draft course", body = ApiResponse<Course>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCourseRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let resp = course_service::create_course(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Updated course", body = ApiResponse<Course>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let resp = course_service::update_course(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/courses/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = UpdateCourseStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Course>),
        (status = 400, description = "Invalid transition"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn update_course_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseStatusRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    let resp = course_service::update_course_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Deleted course"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = course_service::delete_course(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/lessons",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Ordered lessons; paid video URLs withheld from non-enrolled viewers", body = ApiResponse<LessonList>),
        (status = 404, description = "Course not found"),
    ),
    tag = "Lessons"
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LessonList>>> {
    let resp = lesson_service::list_lessons(&state, viewer.as_ref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/lessons",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Create lesson", body = ApiResponse<Lesson>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lessons"
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateLessonRequest>,
) -> AppResult<Json<ApiResponse<Lesson>>> {
    let resp = lesson_service::create_lesson(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/enroll",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Enrolled (idempotent)", body = ApiResponse<CourseEnrollment>),
        (status = 400, description = "Course not open or payment required"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn enroll(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CourseEnrollment>>> {
    let resp = enrollment_service::enroll(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/progress",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Bulk progress for every lesson of the course", body = ApiResponse<CourseProgressView>),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Progress"
)]
pub async fn course_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CourseProgressView>>> {
    let resp = progress_service::course_progress(&state, &user, id).await?;
    Ok(Json(resp))
}
