use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::payments::{CreatePaymentRequest, PaymentList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    routes::params::Pagination,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_my_payments).post(create_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Pending payment opened, or existing pending payment returned", body = ApiResponse<Payment>),
        (status = 400, description = "Course free, unavailable or already paid"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::create_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Caller's payments", body = ApiResponse<PaymentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_my_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_my_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}
