use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::enrollments::EnrollmentList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::enrollment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_my_enrollments))
}

#[utoipa::path(
    get,
    path = "/api/enrollments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Caller's enrollments with course info", body = ApiResponse<EnrollmentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn list_my_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<EnrollmentList>>> {
    let resp = enrollment_service::list_my_enrollments(&state, &user, pagination).await?;
    Ok(Json(resp))
}
